//! Value types for sizes, ratios and crops.
//!
//! All types here are immutable `Copy` values with no I/O, so they are safe
//! to share between threads without synchronization.
//!
//! - [`Rational`]: exact, overflow-checked fractions (aspect ratios)
//! - [`Dimensions`]: a concrete pixel box
//! - [`SizeSpec`]: an absolute box with wildcards, or a bare ratio
//! - [`CropRect`]: a crop in source-pixel coordinates

pub mod crop;
pub mod rational;
pub mod size;

pub use crop::CropRect;
pub use rational::{ArithmeticOverflow, ParseRationalError, Rational};
pub use size::{Dimensions, ParseSizeError, SizeSpec};
