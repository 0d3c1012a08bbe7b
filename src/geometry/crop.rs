//! Crop rectangles in source-pixel coordinates.

use super::rational::Rational;
use super::size::Dimensions;
use std::fmt;

/// An axis-aligned crop, optionally tagged with the aspect ratio it was drawn
/// for. The ratio is a hint for display and validation and is not enforced
/// against `width`/`height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub ratio: Option<Rational>,
}

impl CropRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ratio: None,
        }
    }

    pub fn with_ratio(self, ratio: Rational) -> Self {
        Self {
            ratio: Some(ratio),
            ..self
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the crop lies entirely inside a `bounds` image.
    pub fn within_rect(&self, bounds: Dimensions) -> bool {
        self.x >= 0
            && self.y >= 0
            && i64::from(self.x) + i64::from(self.width) <= i64::from(bounds.width)
            && i64::from(self.y) + i64::from(self.height) <= i64::from(bounds.height)
    }

    /// Multiply all four coordinates by per-axis factors.
    ///
    /// Every field is rounded to the nearest integer with ties away from zero
    /// (`f64::round`), so `x`/`width` and `y`/`height` scale consistently. The
    /// ratio hint is carried over unchanged.
    pub fn scaled_by(&self, factor_x: f64, factor_y: f64) -> Self {
        Self {
            x: round_coordinate(f64::from(self.x) * factor_x),
            y: round_coordinate(f64::from(self.y) * factor_y),
            width: round_length(f64::from(self.width) * factor_x),
            height: round_length(f64::from(self.height) * factor_y),
            ratio: self.ratio,
        }
    }
}

fn round_coordinate(value: f64) -> i32 {
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

fn round_length(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

impl fmt::Display for CropRect {
    /// ImageMagick geometry: `WxH+X+Y`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}
