//! Rasterization density planning for scalable sources.
//!
//! A vector or paged source (SVG, EPS, PDF) has no native pixel grid. Its
//! "dimensions" are the page size at a nominal density (72 units per inch).
//! To render a sharp variant the rasterizer must run at a higher density, and
//! the crop, expressed in nominal page coordinates, must be translated into the
//! coordinates of the rasterized bitmap.
//!
//! Per axis the planner takes `multiplier = max(target / region, 1)`, computes
//! `raw = min(max, nominal * multiplier)` and rounds `raw` up to the next
//! multiple of `step` (capped at `max`) unless it already is one. Rasterizers
//! handle only a bounded set of densities efficiently, so the planner
//! quantizes up front.
//!
//! Raster sources are never planned: their codec size is ground truth.

use super::error::TransformError;
use super::params::{ImageType, VariantRequest};
use crate::geometry::{ArithmeticOverflow, CropRect, Dimensions, Rational};
use log::debug;

/// Nominal density, ceiling and quantization step, all in units per inch.
///
/// The default step of 300 suits Ghostscript. It rounds a 10x enlargement
/// (raw 720) up to 900; configure a step that divides 720, such as 240 or
/// 360, to rasterize that case at exactly 720.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensitySettings {
    pub nominal: u32,
    pub max: u32,
    pub step: u32,
}

impl Default for DensitySettings {
    fn default() -> Self {
        Self {
            nominal: 72,
            max: 1200,
            step: 300,
        }
    }
}

/// Densities to rasterize at, plus the crop in rasterized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityPlan {
    pub horizontal: u32,
    pub vertical: u32,
    /// `None` when no crop was requested.
    pub crop: Option<CropRect>,
}

#[derive(Debug, Clone, Default)]
pub struct DensityPlanner {
    settings: DensitySettings,
}

impl DensityPlanner {
    pub fn new(settings: DensitySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> DensitySettings {
        self.settings
    }

    /// Plan the rasterization of a `page`-sized source for `request`.
    ///
    /// Returns `Ok(None)` for raster sources. A scalable source with an
    /// unknown page size fails with `DimensionProbeFailed`. An explicit
    /// density on the request replaces the computed multipliers.
    pub fn plan(
        &self,
        source_type: ImageType,
        page: Dimensions,
        request: &VariantRequest,
    ) -> Result<Option<DensityPlan>, TransformError> {
        if !source_type.is_scalable() {
            return Ok(None);
        }
        if page.is_partial() {
            return Err(TransformError::DimensionProbeFailed(format!(
                "page size {page} of the {source_type} source is unknown"
            )));
        }

        let region = request.crop().map_or(page, |crop| crop.dimensions());
        let (horizontal, vertical) = match request.density() {
            Some(density) => (
                integer_multiplier(density.horizontal),
                integer_multiplier(density.vertical),
            ),
            None => (
                axis_multiplier(request.width(), region.width)?,
                axis_multiplier(request.height(), region.height)?,
            ),
        };

        let horizontal = self.quantize(horizontal)?;
        let vertical = self.quantize(vertical)?;
        let nominal = f64::from(self.settings.nominal);
        let crop = request.crop().map(|crop| {
            crop.scaled_by(f64::from(horizontal) / nominal, f64::from(vertical) / nominal)
        });

        debug!(
            "Density for {source_type} page {page} -> {}x{}: {horizontal}x{vertical}",
            request.width(),
            request.height()
        );
        Ok(Some(DensityPlan {
            horizontal,
            vertical,
            crop,
        }))
    }

    /// `nominal * multiplier`, capped at `max` and rounded up to a step.
    pub fn quantize(&self, multiplier: Rational) -> Result<u32, ArithmeticOverflow> {
        let DensitySettings { nominal, max, step } = self.settings;
        let max = i64::from(max);
        let step = i64::from(step.max(1));

        let raw = Rational::integer(clamp_to_i32(nominal)).multiply(multiplier.max(Rational::ONE))?;
        let (p, q) = (i64::from(raw.numerator()), i64::from(raw.denominator()));
        // raw > max  <=>  p > max * q, since q > 0
        let (p, q) = if p > max * q { (max, 1) } else { (p, q) };

        let quantized = if q == 1 && p % step == 0 {
            p
        } else {
            ((p / (q * step) + 1) * step).min(max)
        };
        Ok(u32::try_from(quantized).unwrap_or(u32::MAX))
    }
}

/// `max(target / source, 1)` as an exact fraction.
fn axis_multiplier(target: u32, source: u32) -> Result<Rational, ArithmeticOverflow> {
    Ok(Rational::from_dimensions(target, source)?.max(Rational::ONE))
}

fn integer_multiplier(multiplier: u32) -> Rational {
    Rational::integer(clamp_to_i32(multiplier)).max(Rational::ONE)
}

fn clamp_to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
