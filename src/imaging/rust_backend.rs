//! In-process raster transformer on the `image` crate.
//!
//! Everything is statically linked into the binary; no external tool runs.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe (JPEG, PNG, GIF, TIFF, WebP) | `ImageReader::into_dimensions` (header only) |
//! | Decode | `ImageReader::decode` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Alpha flattening | blend onto white per pixel |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → others | `DynamicImage::write_to` |
//!
//! Scalable sources (SVG, EPS, PDF) are out of reach: capability is `Unable`
//! for them, and for vector outputs.

use super::backend::{Action, BackendError, Capability, ModifyAction, ProbeAction, Transformer};
use super::params::{ImageFile, ImageType, Quality};
use crate::geometry::Dimensions;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Pure Rust raster transformer.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustTransformer {
    quality: Quality,
}

impl RustTransformer {
    pub const NAME: &'static str = "rust";

    /// `quality` applies when a request does not set its own.
    pub fn new(quality: Quality) -> Self {
        Self { quality }
    }
}

impl Default for RustTransformer {
    fn default() -> Self {
        Self::new(Quality::default())
    }
}

/// The `image` crate format for a raster type.
fn image_format(image_type: ImageType) -> Option<ImageFormat> {
    match image_type {
        ImageType::Jpeg => Some(ImageFormat::Jpeg),
        ImageType::Png => Some(ImageFormat::Png),
        ImageType::Gif => Some(ImageFormat::Gif),
        ImageType::Tiff => Some(ImageFormat::Tiff),
        ImageType::Webp => Some(ImageFormat::WebP),
        ImageType::Svg | ImageType::Eps | ImageType::Pdf => None,
    }
}

fn can_read(image_type: ImageType) -> bool {
    image_format(image_type).is_some_and(|f| f.reading_enabled())
}

fn can_write(image_type: ImageType) -> bool {
    image_format(image_type).is_some_and(|f| f.writing_enabled())
}

fn reader<'a>(source: &'a ImageFile) -> Result<ImageReader<Cursor<&'a [u8]>>, BackendError> {
    let format = image_format(source.image_type()).ok_or_else(|| {
        BackendError::Unsupported(format!("{} sources", source.image_type()))
    })?;
    Ok(ImageReader::with_format(source.open_stream(), format))
}

/// Decode the source, reporting failures with its declared type.
fn load_image(source: &ImageFile) -> Result<DynamicImage, BackendError> {
    reader(source)?.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", source.image_type(), e))
    })
}

/// Blend every pixel onto an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    });
    DynamicImage::ImageRgb8(flattened)
}

/// Encode into an in-memory buffer of the requested type.
fn encode(img: &DynamicImage, output: ImageType, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let format = image_format(output)
        .ok_or_else(|| BackendError::Unsupported(format!("{output} output")))?;
    let mut buffer = Cursor::new(Vec::new());
    let result = match output {
        ImageType::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        _ if img.color().has_alpha() => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buffer, format)
        }
        _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buffer, format),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{output} encode failed: {e}")))?;
    Ok(buffer.into_inner())
}

impl Transformer for RustTransformer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_execute(&self, action: &Action<'_>) -> Capability {
        let capable = match action {
            Action::ProbeDimensions(probe) => can_read(probe.source.image_type()),
            Action::Modify(modify) => {
                can_read(modify.source.image_type()) && can_write(modify.request.output())
            }
        };
        if capable {
            Capability::Preferred
        } else {
            Capability::Unable
        }
    }

    fn probe_dimensions(&self, action: &ProbeAction<'_>) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(action.source)?.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions::new(width, height))
    }

    fn modify(&self, action: &ModifyAction<'_>) -> Result<ImageFile, BackendError> {
        let request = action.request;
        action.interrupt.check()?;
        let mut img = load_image(action.source)?;
        action.interrupt.check()?;

        if let Some(crop) = action.crop() {
            let bounds = Dimensions::new(img.width(), img.height());
            if !crop.within_rect(bounds) {
                return Err(BackendError::ProcessingFailed(format!(
                    "Crop {crop} exceeds the {bounds} image"
                )));
            }
            img = img.crop_imm(crop.x as u32, crop.y as u32, crop.width, crop.height);
        }

        if (img.width(), img.height()) != (request.width(), request.height()) {
            img = img.resize_exact(request.width(), request.height(), FilterType::Lanczos3);
        }
        action.interrupt.check()?;

        if action.flattens_alpha() && img.color().has_alpha() {
            img = flatten_onto_white(&img);
        }

        let quality = request.quality().unwrap_or(self.quality);
        let bytes = encode(&img, request.output(), quality)?;
        Ok(ImageFile::new(request.output(), bytes))
    }
}
