//! Parameter types for variant operations.
//!
//! These types describe *what* to produce, not *how*. They are the interface
//! between the [`operations`](super::operations) engine, which decides what
//! variant to create, and the [`backend`](super::backend) transformers, which
//! do the pixel work.
//!
//! ## Types
//!
//! - [`ImageType`]: the formats the engine knows about, with their traits
//!   (scalable, transparent, preferred output).
//! - [`ImageFile`]: an immutable source or result. Bytes plus a declared type.
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Density`]: per-axis rasterization multiplier for scalable sources.
//! - [`VariantRequestBuilder`]: raw, possibly incomplete request parameters.
//! - [`VariantRequest`]: a fully resolved request. Only the builder makes one.

use super::calculations::{
    default_crop, fill_unknown_dimension, fits_in, normalize_to_ratio, scale_to_fit_in,
    translate_crop,
};
use super::error::TransformError;
use crate::geometry::{CropRect, Dimensions, Rational};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognised image type for {0}")]
    UnknownType(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid density {0:?}, expected N or HxV with positive multipliers")]
pub struct ParseDensityError(String);

/// Image formats understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Webp,
    Svg,
    Eps,
    Pdf,
}

impl ImageType {
    pub const ALL: [ImageType; 8] = [
        ImageType::Jpeg,
        ImageType::Png,
        ImageType::Gif,
        ImageType::Tiff,
        ImageType::Webp,
        ImageType::Svg,
        ImageType::Eps,
        ImageType::Pdf,
    ];

    pub fn content_type(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Gif => "image/gif",
            ImageType::Tiff => "image/tiff",
            ImageType::Webp => "image/webp",
            ImageType::Svg => "image/svg+xml",
            ImageType::Eps => "application/postscript",
            ImageType::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Tiff => "tiff",
            ImageType::Webp => "webp",
            ImageType::Svg => "svg",
            ImageType::Eps => "eps",
            ImageType::Pdf => "pdf",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(ImageType::Jpeg),
            "png" => Some(ImageType::Png),
            "gif" => Some(ImageType::Gif),
            "tif" | "tiff" => Some(ImageType::Tiff),
            "webp" => Some(ImageType::Webp),
            "svg" => Some(ImageType::Svg),
            "eps" | "epsf" | "epsi" | "ps" => Some(ImageType::Eps),
            "pdf" => Some(ImageType::Pdf),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|t| t.content_type().eq_ignore_ascii_case(essence))
            .or_else(|| match essence.to_ascii_lowercase().as_str() {
                "image/jpg" | "image/pjpeg" => Some(ImageType::Jpeg),
                "image/eps" | "image/x-eps" | "application/eps" => Some(ImageType::Eps),
                _ => None,
            })
    }

    /// Resolution-independent formats that must be rasterized at a density.
    pub fn is_scalable(self) -> bool {
        matches!(self, ImageType::Svg | ImageType::Eps | ImageType::Pdf)
    }

    pub fn has_transparency(self) -> bool {
        !matches!(self, ImageType::Jpeg)
    }

    /// Default output format for a source of this type.
    ///
    /// Vectors rasterize to PNG and TIFF recodes to JPEG. Web formats stay as
    /// they are.
    pub fn preferred_output(self) -> Self {
        match self {
            ImageType::Svg | ImageType::Eps | ImageType::Pdf => ImageType::Png,
            ImageType::Tiff => ImageType::Jpeg,
            other => other,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .or_else(|| Self::from_content_type(s))
            .ok_or_else(|| format!("unknown image type {s:?}"))
    }
}

/// An image in memory: declared type plus content.
///
/// Cloning is cheap and shares the bytes. Nothing in the engine mutates the
/// content of an `ImageFile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    image_type: ImageType,
    bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn new(image_type: ImageType, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            image_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub fn open(path: &Path) -> Result<Self, ImageFileError> {
        let image_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageType::from_extension)
            .ok_or_else(|| ImageFileError::UnknownType(path.to_path_buf()))?;
        let bytes = std::fs::read(path)?;
        Ok(Self::new(image_type, bytes))
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn content(&self) -> &[u8] {
        &self.bytes
    }

    pub fn open_stream(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.bytes)
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Rasterization multiplier per axis, relative to the nominal density.
///
/// A density of `2x3` renders a vector at twice the nominal horizontal and
/// three times the nominal vertical resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Density {
    pub horizontal: u32,
    pub vertical: u32,
}

impl Density {
    pub const fn new(horizontal: u32, vertical: u32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub const fn uniform(multiplier: u32) -> Self {
        Self::new(multiplier, multiplier)
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.horizontal, self.vertical)
    }
}

impl FromStr for Density {
    type Err = ParseDensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDensityError(s.to_string());
        let parse = |part: &str| part.trim().parse::<u32>().ok().filter(|n| *n > 0);
        match s.split_once(['x', 'X']) {
            Some((h, v)) => Ok(Density::new(
                parse(h).ok_or_else(err)?,
                parse(v).ok_or_else(err)?,
            )),
            None => Ok(Density::uniform(parse(s).ok_or_else(err)?)),
        }
    }
}

/// Raw request parameters, any of which may be left to derive from the source.
///
/// Call [`resolve`](Self::resolve) with the probed source size to obtain an
/// immutable [`VariantRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantRequestBuilder {
    width: Option<u32>,
    height: Option<u32>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    ratio: Option<Rational>,
    crop: Option<CropRect>,
    crop_source: Option<Dimensions>,
    density: Option<Density>,
    output: Option<ImageType>,
    stretch: bool,
    keep_aspect: bool,
    quality: Option<Quality>,
}

impl VariantRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn max_height(mut self, max_height: u32) -> Self {
        self.max_height = Some(max_height);
        self
    }

    /// Aspect ratio used to derive a missing width or height.
    pub fn ratio(mut self, ratio: Rational) -> Self {
        self.ratio = (!ratio.is_undefined()).then_some(ratio);
        self
    }

    pub fn crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    /// The image size the crop coordinates were drawn against, when that
    /// differs from the source (e.g. a downscaled preview).
    pub fn crop_source(mut self, dimensions: Dimensions) -> Self {
        self.crop_source = Some(dimensions);
        self
    }

    pub fn density(mut self, density: Density) -> Self {
        self.density = Some(density);
        self
    }

    pub fn output(mut self, output: ImageType) -> Self {
        self.output = Some(output);
        self
    }

    pub fn stretch(mut self, stretch: bool) -> Self {
        self.stretch = stretch;
        self
    }

    pub fn keep_aspect(mut self, keep_aspect: bool) -> Self {
        self.keep_aspect = keep_aspect;
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Resolve every "derive from source" placeholder against the source.
    ///
    /// The crop (translated into source space) or else the whole source is
    /// the reference box. Missing sides come from the requested ratio or the
    /// reference ratio, then `keep_aspect` and the max bounds apply. Without
    /// `stretch`, raster targets never exceed the reference box and a centred
    /// crop removes any ratio mismatch.
    pub fn resolve(
        &self,
        source_type: ImageType,
        source: Dimensions,
    ) -> Result<VariantRequest, TransformError> {
        if source.is_partial() {
            return Err(TransformError::DimensionProbeFailed(format!(
                "source size {source} is incomplete"
            )));
        }

        let crop = self.resolve_crop(source)?;
        let reference = crop.map_or(source, |c| c.dimensions());
        let reference_ratio = reference.aspect_ratio()?;

        let requested = Dimensions::new(self.width.unwrap_or(0), self.height.unwrap_or(0));
        let mut target = if requested.width == 0 && requested.height == 0 {
            match self.ratio {
                Some(ratio) => scale_to_fit_in(normalize_to_ratio(reference, ratio)?, reference)?,
                None => reference,
            }
        } else {
            fill_unknown_dimension(requested, self.ratio.unwrap_or(reference_ratio))
        };

        if self.keep_aspect {
            target = normalize_to_ratio(target, reference_ratio)?;
        }

        let max_width = self.max_width.filter(|m| *m > 0);
        let max_height = self.max_height.filter(|m| *m > 0);
        if max_width.is_some() || max_height.is_some() {
            let bounds = Dimensions::new(
                max_width.unwrap_or(target.width),
                max_height.unwrap_or(target.height),
            );
            if !bounds.is_partial() && !fits_in(target, bounds) {
                target = scale_to_fit_in(target, bounds)?;
            }
        }

        // A vector has no native pixel limit, so only rasters are capped.
        if !self.stretch && !source_type.is_scalable() && !target.is_partial() {
            target = scale_to_fit_in(target, reference)?;
        }

        if target.is_partial() {
            return Err(TransformError::InvalidRequest(format!(
                "target size {target} resolves to zero"
            )));
        }

        let crop = match crop {
            Some(crop) => Some(crop),
            None if !self.stretch => default_crop(source, target.aspect_ratio()?)?,
            None => None,
        };

        Ok(VariantRequest {
            width: target.width,
            height: target.height,
            crop,
            density: self.density,
            output: self
                .output
                .unwrap_or_else(|| source_type.preferred_output()),
            stretch: self.stretch,
            quality: self.quality,
        })
    }

    /// Translate the requested crop into source space.
    ///
    /// A crop covering the whole source is dropped.
    fn resolve_crop(&self, source: Dimensions) -> Result<Option<CropRect>, TransformError> {
        let Some(crop) = self.crop else {
            return Ok(None);
        };
        let from = self.crop_source.filter(|d| !d.is_partial()).unwrap_or(source);
        let translated = translate_crop(crop, from, source);
        if translated.is_empty() {
            return Err(TransformError::InvalidRequest(format!(
                "crop {crop} does not overlap the {from} image it was drawn on"
            )));
        }
        if translated.x == 0 && translated.y == 0 && translated.dimensions() == source {
            return Ok(None);
        }
        Ok(Some(translated))
    }
}

/// A fully resolved variant request.
///
/// Both target sides are non-zero and any crop lies inside the source.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRequest {
    width: u32,
    height: u32,
    crop: Option<CropRect>,
    density: Option<Density>,
    output: ImageType,
    stretch: bool,
    quality: Option<Quality>,
}

impl VariantRequest {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn target(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// Explicit density override, bypassing the planner's computed multiplier.
    pub fn density(&self) -> Option<Density> {
        self.density
    }

    pub fn output(&self) -> ImageType {
        self.output
    }

    pub fn stretch(&self) -> bool {
        self.stretch
    }

    pub fn quality(&self) -> Option<Quality> {
        self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height)
    }

    fn ratio(p: i32, q: i32) -> Rational {
        Rational::of(p, q).unwrap()
    }

    // =========================================================================
    // ImageType
    // =========================================================================

    #[test]
    fn image_type_lookup() {
        assert_eq!(ImageType::from_extension("JPG"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_extension("tif"), Some(ImageType::Tiff));
        assert_eq!(ImageType::from_extension("txt"), None);
        assert_eq!(
            ImageType::from_content_type("application/pdf"),
            Some(ImageType::Pdf)
        );
        assert_eq!(
            ImageType::from_content_type("image/svg+xml; charset=utf-8"),
            Some(ImageType::Svg)
        );
        assert_eq!("png".parse::<ImageType>(), Ok(ImageType::Png));
        assert!("bmp".parse::<ImageType>().is_err());
    }

    #[test]
    fn image_type_traits() {
        for t in ImageType::ALL {
            assert_eq!(
                t.is_scalable(),
                matches!(t, ImageType::Svg | ImageType::Eps | ImageType::Pdf)
            );
        }
        assert!(!ImageType::Jpeg.has_transparency());
        assert!(ImageType::Png.has_transparency());
        assert_eq!(ImageType::Eps.preferred_output(), ImageType::Png);
        assert_eq!(ImageType::Tiff.preferred_output(), ImageType::Jpeg);
        assert_eq!(ImageType::Gif.preferred_output(), ImageType::Gif);
    }

    #[test]
    fn image_file_shares_content() {
        let file = ImageFile::new(ImageType::Png, vec![1u8, 2, 3]);
        let copy = file.clone();
        assert_eq!(copy.byte_size(), 3);
        assert_eq!(copy.content(), file.content());
        assert_eq!(file.open_stream().into_inner(), &[1, 2, 3]);
    }

    #[test]
    fn image_file_open_uses_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logo.EPS");
        std::fs::write(&path, b"%!PS").unwrap();
        let file = ImageFile::open(&path).unwrap();
        assert_eq!(file.image_type(), ImageType::Eps);

        let unknown = tmp.path().join("notes.txt");
        std::fs::write(&unknown, b"hi").unwrap();
        assert!(matches!(
            ImageFile::open(&unknown),
            Err(ImageFileError::UnknownType(_))
        ));
    }

    // =========================================================================
    // Quality and Density
    // =========================================================================

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn density_parsing() {
        assert_eq!("3".parse::<Density>().unwrap(), Density::uniform(3));
        assert_eq!("2x4".parse::<Density>().unwrap(), Density::new(2, 4));
        assert!("0".parse::<Density>().is_err());
        assert!("2x".parse::<Density>().is_err());
        assert_eq!(Density::new(2, 4).to_string(), "2x4");
    }

    // =========================================================================
    // Request resolution
    // =========================================================================

    #[test]
    fn empty_request_is_the_source() {
        let request = VariantRequestBuilder::new()
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(800, 600));
        assert_eq!(request.crop(), None);
        assert_eq!(request.output(), ImageType::Jpeg);
    }

    #[test]
    fn missing_height_follows_source_ratio() {
        let request = VariantRequestBuilder::new()
            .width(400)
            .resolve(ImageType::Png, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(400, 300));
        assert_eq!(request.crop(), None);
    }

    #[test]
    fn missing_height_follows_requested_ratio_and_crops() {
        let request = VariantRequestBuilder::new()
            .width(400)
            .ratio(ratio(1, 1))
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(400, 400));
        assert_eq!(request.crop(), Some(CropRect::new(100, 0, 600, 600).with_ratio(Rational::ONE)));
    }

    #[test]
    fn ratio_only_request_fits_the_source() {
        let request = VariantRequestBuilder::new()
            .ratio(ratio(16, 9))
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(800, 450));
    }

    #[test]
    fn raster_target_never_exceeds_source() {
        let request = VariantRequestBuilder::new()
            .width(1600)
            .height(1200)
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(800, 600));
    }

    #[test]
    fn stretch_allows_distortion_and_upscaling() {
        let request = VariantRequestBuilder::new()
            .width(1000)
            .height(100)
            .stretch(true)
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(1000, 100));
        assert_eq!(request.crop(), None);
        assert!(request.stretch());
    }

    #[test]
    fn vector_target_may_exceed_nominal_size() {
        let request = VariantRequestBuilder::new()
            .width(1300)
            .height(1040)
            .resolve(ImageType::Eps, dims(130, 104))
            .unwrap();
        assert_eq!(request.target(), dims(1300, 1040));
        assert_eq!(request.crop(), None);
        assert_eq!(request.output(), ImageType::Png);
    }

    #[test]
    fn keep_aspect_overrides_requested_shape() {
        let request = VariantRequestBuilder::new()
            .width(400)
            .height(400)
            .keep_aspect(true)
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(400, 300));
        assert_eq!(request.crop(), None);
    }

    #[test]
    fn max_bounds_scale_down() {
        let request = VariantRequestBuilder::new()
            .max_width(200)
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(200, 150));

        let request = VariantRequestBuilder::new()
            .max_height(60)
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(80, 60));
    }

    #[test]
    fn explicit_crop_is_the_reference_box() {
        let request = VariantRequestBuilder::new()
            .crop(CropRect::new(100, 100, 400, 200))
            .width(200)
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.target(), dims(200, 100));
        assert_eq!(request.crop(), Some(CropRect::new(100, 100, 400, 200)));
    }

    #[test]
    fn crop_from_preview_space_is_translated() {
        let request = VariantRequestBuilder::new()
            .crop(CropRect::new(10, 10, 100, 50))
            .crop_source(dims(400, 300))
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.crop(), Some(CropRect::new(20, 20, 200, 100)));
        assert_eq!(request.target(), dims(200, 100));
    }

    #[test]
    fn preview_crop_at_the_right_edge_stays_inside_source() {
        let source = dims(1000, 750);
        let request = VariantRequestBuilder::new()
            .crop(CropRect::new(1, 0, 399, 300))
            .crop_source(dims(400, 300))
            .resolve(ImageType::Png, source)
            .unwrap();
        let crop = request.crop().unwrap();
        assert!(crop.within_rect(source), "{crop}");
        assert_eq!(crop, CropRect::new(3, 0, 997, 750));
    }

    #[test]
    fn crop_covering_source_is_dropped() {
        let request = VariantRequestBuilder::new()
            .crop(CropRect::new(-10, -10, 900, 700))
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap();
        assert_eq!(request.crop(), None);
    }

    #[test]
    fn crop_outside_source_is_invalid() {
        let err = VariantRequestBuilder::new()
            .crop(CropRect::new(900, 0, 100, 100))
            .resolve(ImageType::Jpeg, dims(800, 600))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidRequest(_)));
    }

    #[test]
    fn incomplete_source_size_fails_probe() {
        let err = VariantRequestBuilder::new()
            .width(100)
            .resolve(ImageType::Jpeg, dims(800, 0))
            .unwrap_err();
        assert!(matches!(err, TransformError::DimensionProbeFailed(_)));
    }

    #[test]
    fn zero_target_is_invalid() {
        // 1 pixel high at 1/1000 rounds the width to zero
        let err = VariantRequestBuilder::new()
            .height(1)
            .stretch(true)
            .resolve(ImageType::Jpeg, dims(1, 1000))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidRequest(_)));
    }

    #[test]
    fn explicit_output_and_density_are_kept() {
        let request = VariantRequestBuilder::new()
            .output(ImageType::Jpeg)
            .density(Density::uniform(4))
            .quality(Quality::new(70))
            .resolve(ImageType::Pdf, dims(612, 792))
            .unwrap();
        assert_eq!(request.output(), ImageType::Jpeg);
        assert_eq!(request.density(), Some(Density::uniform(4)));
        assert_eq!(request.quality(), Some(Quality::new(70)));
    }
}
