//! Absolute pixel sizes and size specifications.
//!
//! [`Dimensions`] is a concrete `width x height` pixel box, used for probed
//! source sizes and resolved targets. [`SizeSpec`] is what a preset or a
//! request *asks for*. It is either an absolute box, where a zero component
//! acts as a wildcard, or a bare aspect ratio.

use super::rational::{ArithmeticOverflow, ParseRationalError, Rational};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A concrete pixel box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero (unknown or unspecified).
    pub fn is_partial(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> Result<Rational, ArithmeticOverflow> {
        Rational::from_dimensions(self.width, self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSizeError {
    #[error("size should be \"WxH\" or \"p/q\", got {0:?}")]
    Format(String),
    #[error("a relative size needs a defined ratio, got {0:?}")]
    UndefinedRatio(String),
    #[error(transparent)]
    Ratio(#[from] ParseRationalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Absolute { width: u32, height: u32 },
    Relative(Rational),
}

/// A requested size: absolute pixels or an aspect ratio only.
///
/// Ordering puts every absolute size before every relative one. Absolute
/// sizes compare by height, then width. Relative sizes compare by ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeSpec(Repr);

impl SizeSpec {
    pub const fn absolute(width: u32, height: u32) -> Self {
        Self(Repr::Absolute { width, height })
    }

    /// A ratio-only size. Returns `None` for [`Rational::UNDEFINED`].
    pub fn relative(ratio: Rational) -> Option<Self> {
        (!ratio.is_undefined()).then_some(Self(Repr::Relative(ratio)))
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self.0, Repr::Absolute { .. })
    }

    /// The pixel box of an absolute size.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self.0 {
            Repr::Absolute { width, height } => Some(Dimensions::new(width, height)),
            Repr::Relative(_) => None,
        }
    }

    /// False for an absolute size with a zero component.
    pub fn has_aspect_ratio(&self) -> bool {
        match self.0 {
            Repr::Absolute { width, height } => width != 0 && height != 0,
            Repr::Relative(_) => true,
        }
    }

    /// `width/height` for absolute sizes, the stored ratio otherwise.
    ///
    /// An absolute size with a zero height yields [`Rational::UNDEFINED`].
    pub fn aspect_ratio(&self) -> Result<Rational, ArithmeticOverflow> {
        match self.0 {
            Repr::Absolute { width, height } => Rational::from_dimensions(width, height),
            Repr::Relative(ratio) => Ok(ratio),
        }
    }

    /// Does an actual `width x height` image satisfy this size?
    ///
    /// Absolute components must match exactly unless they are zero. A relative
    /// size matches when the reduced actual ratio equals the stored ratio.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        match self.0 {
            Repr::Absolute {
                width: w,
                height: h,
            } => (w == 0 || w == width) && (h == 0 || h == height),
            Repr::Relative(ratio) => {
                Rational::from_dimensions(width, height).is_ok_and(|actual| actual == ratio)
            }
        }
    }
}

impl From<Dimensions> for SizeSpec {
    fn from(dimensions: Dimensions) -> Self {
        Self::absolute(dimensions.width, dimensions.height)
    }
}

impl Ord for SizeSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Repr::Absolute { .. }, Repr::Relative(_)) => Ordering::Less,
            (Repr::Relative(_), Repr::Absolute { .. }) => Ordering::Greater,
            (
                Repr::Absolute { width, height },
                Repr::Absolute {
                    width: other_width,
                    height: other_height,
                },
            ) => height
                .cmp(&other_height)
                .then_with(|| width.cmp(&other_width)),
            (Repr::Relative(ratio), Repr::Relative(other_ratio)) => ratio.cmp(&other_ratio),
        }
    }
}

impl PartialOrd for SizeSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SizeSpec {
    /// `800x600`, `x600`, `800x`, `x` or `4/3`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Absolute { width, height } => {
                if width != 0 {
                    write!(f, "{width}")?;
                }
                f.write_str("x")?;
                if height != 0 {
                    write!(f, "{height}")?;
                }
                Ok(())
            }
            Repr::Relative(ratio) => write!(f, "{ratio}"),
        }
    }
}

impl FromStr for SizeSpec {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('/') {
            let ratio: Rational = s.parse()?;
            return SizeSpec::relative(ratio)
                .ok_or_else(|| ParseSizeError::UndefinedRatio(s.to_string()));
        }

        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| ParseSizeError::Format(s.to_string()))?;
        let component = |part: &str| -> Result<u32, ParseSizeError> {
            if part.is_empty() {
                return Ok(0);
            }
            part.parse()
                .map_err(|_| ParseSizeError::Format(s.to_string()))
        };
        Ok(SizeSpec::absolute(component(width)?, component(height)?))
    }
}
