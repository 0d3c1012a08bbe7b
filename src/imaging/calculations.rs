//! Pure calculation functions for variant dimensions and crops.
//!
//! All functions here are pure and testable without any I/O or images. Ratio
//! comparisons go through [`Rational`] so that "same aspect ratio" means
//! exactly the same reduced fraction, never a float within some epsilon.

use crate::geometry::{ArithmeticOverflow, CropRect, Dimensions, Rational};

/// Does `size` fit inside `bounds` on both axes?
pub fn fits_in(size: Dimensions, bounds: Dimensions) -> bool {
    size.width <= bounds.width && size.height <= bounds.height
}

/// Compute a single zero side from `ratio`.
///
/// `(800, 0)` with ratio 4/3 becomes `(800, 600)`. Sizes with both sides
/// known, or both unknown, are returned unchanged.
pub fn fill_unknown_dimension(size: Dimensions, ratio: Rational) -> Dimensions {
    match (size.width, size.height) {
        (0, 0) => size,
        (width, 0) => Dimensions::new(width, ratio.calculate_height_for_width(width)),
        (0, height) => Dimensions::new(ratio.calculate_width_for_height(height), height),
        _ => size,
    }
}

/// Reshape `size` to `ratio`, keeping the side the ratio favours.
///
/// A landscape ratio keeps the width and recomputes the height. Any other
/// ratio keeps the height and recomputes the width.
pub fn normalize_to_ratio(
    size: Dimensions,
    ratio: Rational,
) -> Result<Dimensions, ArithmeticOverflow> {
    if size.aspect_ratio()? == ratio {
        return Ok(size);
    }
    Ok(if ratio.is_larger_on_width() {
        Dimensions::new(size.width, ratio.calculate_height_for_width(size.width))
    } else {
        Dimensions::new(ratio.calculate_width_for_height(size.height), size.height)
    })
}

/// Downscale `size` to fit inside `bounds`, preserving its aspect ratio.
///
/// Unknown sides are first filled from the ratio of `bounds`. Sizes that
/// already fit are returned unchanged; this never upscales.
///
/// # Examples
/// ```
/// # use variant_engine::geometry::Dimensions;
/// # use variant_engine::imaging::calculations::scale_to_fit_in;
/// let fitted = scale_to_fit_in(Dimensions::new(800, 600), Dimensions::new(400, 500)).unwrap();
/// assert_eq!(fitted, Dimensions::new(400, 300));
/// ```
pub fn scale_to_fit_in(
    size: Dimensions,
    bounds: Dimensions,
) -> Result<Dimensions, ArithmeticOverflow> {
    let size = if size.width == 0 && size.height == 0 {
        bounds
    } else {
        fill_unknown_dimension(size, bounds.aspect_ratio()?)
    };
    if fits_in(size, bounds) {
        return Ok(size);
    }

    let ratio = size.aspect_ratio()?;
    let by_width = Dimensions::new(bounds.width, ratio.calculate_height_for_width(bounds.width));
    let by_height = Dimensions::new(ratio.calculate_width_for_height(bounds.height), bounds.height);

    // Start from the side the ratio favours; if rounding pushed the other
    // side out of bounds, fall back to the other axis.
    let (first, second) = if ratio.is_larger_on_width() {
        (by_width, by_height)
    } else {
        (by_height, by_width)
    };
    Ok(if fits_in(first, bounds) { first } else { second })
}

/// Largest centred crop of `source` with exactly `target_ratio`.
///
/// Returns `None` when the source already has that ratio (or either is
/// unknown), meaning no crop is needed to avoid distortion.
pub fn default_crop(
    source: Dimensions,
    target_ratio: Rational,
) -> Result<Option<CropRect>, ArithmeticOverflow> {
    if source.is_partial() || target_ratio.is_undefined() || source.aspect_ratio()? == target_ratio
    {
        return Ok(None);
    }

    let shaped = normalize_to_ratio(source, target_ratio)?;
    let fitted = scale_to_fit_in(shaped, source)?;
    let x = source.width.saturating_sub(fitted.width) / 2;
    let y = source.height.saturating_sub(fitted.height) / 2;

    Ok(Some(
        CropRect::new(x as i32, y as i32, fitted.width, fitted.height).with_ratio(target_ratio),
    ))
}

/// Translate a crop drawn against `from` into the coordinate space of `to`.
///
/// Edges are first snapped into `from` (negative or overshooting coordinates
/// are clamped), then each edge is scaled by `to / from` and rounded, so the
/// result always lies within `to`.
pub fn translate_crop(crop: CropRect, from: Dimensions, to: Dimensions) -> CropRect {
    let left = snap(i64::from(crop.x), from.width);
    let top = snap(i64::from(crop.y), from.height);
    let right = snap(i64::from(crop.x) + i64::from(crop.width), from.width);
    let bottom = snap(i64::from(crop.y) + i64::from(crop.height), from.height);

    let (left, right, top, bottom) = if from == to || from.is_partial() {
        (left, right, top, bottom)
    } else {
        (
            scale_edge(left, from.width, to.width),
            scale_edge(right, from.width, to.width),
            scale_edge(top, from.height, to.height),
            scale_edge(bottom, from.height, to.height),
        )
    };

    CropRect {
        x: left as i32,
        y: top as i32,
        width: (right - left).max(0) as u32,
        height: (bottom - top).max(0) as u32,
        ratio: crop.ratio,
    }
}

/// Map an edge in `0..=from` onto `0..=to`, rounding ties away from zero.
fn scale_edge(edge: i64, from: u32, to: u32) -> i64 {
    let scaled = (edge as f64 * f64::from(to) / f64::from(from)).round() as i64;
    snap(scaled, to)
}

/// Clamp `position` into `0..=max`.
fn snap(position: i64, max: u32) -> i64 {
    position.clamp(0, i64::from(max))
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
    // fill_unknown_dimension tests
    // =========================================================================

    #[test]
    fn fill_missing_height() {
        assert_eq!(fill_unknown_dimension(dims(800, 0), ratio(4, 3)), dims(800, 600));
    }

    #[test]
    fn fill_missing_width() {
        assert_eq!(fill_unknown_dimension(dims(0, 900), ratio(16, 9)), dims(1600, 900));
    }

    #[test]
    fn fill_leaves_complete_and_empty_sizes_alone() {
        assert_eq!(fill_unknown_dimension(dims(10, 20), ratio(4, 3)), dims(10, 20));
        assert_eq!(fill_unknown_dimension(dims(0, 0), ratio(4, 3)), dims(0, 0));
    }

    // =========================================================================
    // normalize_to_ratio tests
    // =========================================================================

    #[test]
    fn normalize_landscape_keeps_width() {
        assert_eq!(normalize_to_ratio(dims(800, 800), ratio(16, 9)).unwrap(), dims(800, 450));
    }

    #[test]
    fn normalize_portrait_keeps_height() {
        assert_eq!(normalize_to_ratio(dims(800, 800), ratio(4, 5)).unwrap(), dims(640, 800));
    }

    #[test]
    fn normalize_same_ratio_is_identity() {
        assert_eq!(normalize_to_ratio(dims(400, 300), ratio(4, 3)).unwrap(), dims(400, 300));
    }

    // =========================================================================
    // scale_to_fit_in tests
    // =========================================================================

    #[test]
    fn fit_wider_source_into_portrait_box() {
        assert_eq!(scale_to_fit_in(dims(800, 600), dims(400, 500)).unwrap(), dims(400, 300));
    }

    #[test]
    fn fit_taller_source_into_landscape_box() {
        assert_eq!(scale_to_fit_in(dims(600, 800), dims(500, 400)).unwrap(), dims(300, 400));
    }

    #[test]
    fn fit_square_retries_other_axis() {
        // Square starts from height: 400x400 overflows 300 wide, so width wins
        assert_eq!(scale_to_fit_in(dims(1000, 1000), dims(300, 400)).unwrap(), dims(300, 300));
        assert_eq!(scale_to_fit_in(dims(1000, 1000), dims(400, 300)).unwrap(), dims(300, 300));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(scale_to_fit_in(dims(100, 50), dims(400, 500)).unwrap(), dims(100, 50));
    }

    #[test]
    fn fit_fills_unknown_sides_from_bounds() {
        assert_eq!(scale_to_fit_in(dims(0, 0), dims(400, 300)).unwrap(), dims(400, 300));
        assert_eq!(scale_to_fit_in(dims(200, 0), dims(400, 300)).unwrap(), dims(200, 150));
    }

    // =========================================================================
    // default_crop tests
    // =========================================================================

    #[test]
    fn default_crop_square_from_landscape() {
        let crop = default_crop(dims(800, 600), ratio(1, 1)).unwrap().unwrap();
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (100, 0, 600, 600));
        assert_eq!(crop.ratio, Some(Rational::ONE));
    }

    #[test]
    fn default_crop_widescreen_from_portrait() {
        let crop = default_crop(dims(600, 800), ratio(16, 9)).unwrap().unwrap();
        // 600 * 9/16 = 337.5, rounded up to 338
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (0, 231, 600, 338));
    }

    #[test]
    fn default_crop_portrait_ratio_that_must_be_refitted() {
        let crop = default_crop(dims(600, 800), ratio(4, 5)).unwrap().unwrap();
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (0, 25, 600, 750));
    }

    #[test]
    fn default_crop_not_needed_for_matching_ratio() {
        assert_eq!(default_crop(dims(1600, 900), ratio(16, 9)).unwrap(), None);
        assert_eq!(default_crop(dims(0, 900), ratio(16, 9)).unwrap(), None);
    }

    // =========================================================================
    // translate_crop tests
    // =========================================================================

    #[test]
    fn translate_crop_between_spaces() {
        // Crop drawn on a 400x300 preview of a 1600x1200 original
        let crop = CropRect::new(40, 30, 200, 100);
        let translated = translate_crop(crop, dims(400, 300), dims(1600, 1200));
        assert_eq!(translated, CropRect::new(160, 120, 800, 400));
    }

    #[test]
    fn translate_crop_snaps_out_of_bounds_edges() {
        let crop = CropRect::new(-20, 250, 100, 100);
        let translated = translate_crop(crop, dims(400, 300), dims(400, 300));
        assert_eq!(translated, CropRect::new(0, 250, 80, 50));
    }

    #[test]
    fn translate_crop_touching_the_edge_stays_inside() {
        // 1..400 on a 400 wide preview: x rounds up from 2.5, the right edge
        // must still end exactly at 1000
        let crop = CropRect::new(1, 0, 399, 300);
        let translated = translate_crop(crop, dims(400, 300), dims(1000, 750));
        assert_eq!(translated, CropRect::new(3, 0, 997, 750));
        assert!(translated.within_rect(dims(1000, 750)));
    }

    #[test]
    fn translate_crop_always_within_target() {
        let to = dims(1000, 750);
        for x in 0..40 {
            for width in [1, 7, 133, 399] {
                let crop = CropRect::new(x, x, width, width);
                let translated = translate_crop(crop, dims(400, 300), to);
                assert!(translated.within_rect(to), "{crop} -> {translated}");
            }
        }
    }

    #[test]
    fn translate_crop_can_collapse_to_empty() {
        let crop = CropRect::new(500, 0, 100, 100);
        assert!(translate_crop(crop, dims(400, 300), dims(400, 300)).is_empty());
    }
}
