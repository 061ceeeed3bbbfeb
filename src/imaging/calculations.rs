//! Pure calculation functions for variant dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// A single variant size to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSize {
    pub width: u32,
    pub height: u32,
}

/// Calculate which ladder widths apply to an original and their heights.
///
/// A width is skipped whenever it is greater than or equal to the original
/// width: variants only ever shrink. Heights preserve the aspect ratio,
/// rounded to the nearest pixel and never below 1. Duplicate widths in the
/// ladder collapse to one entry.
///
/// # Examples
/// ```
/// # use gallery_index::imaging::plan_variant_sizes;
/// let sizes = plan_variant_sizes((2000, 1500), &[800, 1600, 2400]);
/// let widths: Vec<u32> = sizes.iter().map(|s| s.width).collect();
/// assert_eq!(widths, vec![800, 1600]);
/// assert_eq!(sizes[0].height, 600);
///
/// // Nothing to do for an original narrower than the smallest width.
/// assert!(plan_variant_sizes((500, 400), &[800, 1600, 2400]).is_empty());
/// ```
pub fn plan_variant_sizes(original: (u32, u32), ladder: &[u32]) -> Vec<VariantSize> {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || orig_h == 0 {
        return Vec::new();
    }

    let mut widths: Vec<u32> = ladder
        .iter()
        .copied()
        .filter(|&w| w > 0 && w < orig_w)
        .collect();
    widths.sort_unstable();
    widths.dedup();

    widths
        .into_iter()
        .map(|width| VariantSize {
            width,
            height: scaled_height(original, width),
        })
        .collect()
}

/// Height of an original scaled to `target_width`, keeping the aspect ratio.
pub fn scaled_height(original: (u32, u32), target_width: u32) -> u32 {
    let (orig_w, orig_h) = original;
    let h = (orig_h as f64 * target_width as f64 / orig_w as f64).round() as u32;
    h.max(1)
}

/// The width whose variant stands in for "this original has been
/// optimized": the smallest one in the ladder.
pub fn representative_width(ladder: &[u32]) -> Option<u32> {
    ladder.iter().copied().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LADDER: &[u32] = &[800, 1600, 2400];

    // =========================================================================
    // plan_variant_sizes
    // =========================================================================

    #[test]
    fn narrow_original_gets_no_variants() {
        assert!(plan_variant_sizes((500, 375), LADDER).is_empty());
    }

    #[test]
    fn equal_width_is_not_upscaled() {
        assert!(plan_variant_sizes((800, 600), LADDER).is_empty());
        let sizes = plan_variant_sizes((1600, 1200), LADDER);
        assert_eq!(sizes, vec![VariantSize { width: 800, height: 600 }]);
    }

    #[test]
    fn wide_original_gets_every_smaller_width() {
        let sizes = plan_variant_sizes((3000, 2000), LADDER);
        assert_eq!(
            sizes,
            vec![
                VariantSize { width: 800, height: 533 },
                VariantSize { width: 1600, height: 1067 },
                VariantSize { width: 2400, height: 1600 },
            ]
        );
    }

    #[test]
    fn portrait_heights_follow_width() {
        let sizes = plan_variant_sizes((1000, 2000), LADDER);
        assert_eq!(sizes, vec![VariantSize { width: 800, height: 1600 }]);
    }

    #[test]
    fn unsorted_and_duplicate_ladder_is_normalized() {
        let sizes = plan_variant_sizes((2000, 1000), &[1600, 800, 800, 0]);
        let widths: Vec<u32> = sizes.iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![800, 1600]);
    }

    #[test]
    fn degenerate_original_plans_nothing() {
        assert!(plan_variant_sizes((0, 100), LADDER).is_empty());
        assert!(plan_variant_sizes((100, 0), LADDER).is_empty());
    }

    // =========================================================================
    // scaled_height / representative_width
    // =========================================================================

    #[test]
    fn scaled_height_rounds_and_never_hits_zero() {
        assert_eq!(scaled_height((2000, 1333), 800), 533);
        assert_eq!(scaled_height((3000, 1), 800), 1);
    }

    #[test]
    fn representative_is_smallest() {
        assert_eq!(representative_width(&[1600, 800, 2400]), Some(800));
        assert_eq!(representative_width(&[]), None);
    }
}
