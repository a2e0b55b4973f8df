//! Rasterization resolution planning.

/// Reference page width (A4), in millimetres.
const PAGE_WIDTH_MM: f64 = 210.0;
const MM_PER_INCH: f64 = 25.4;
/// Over-render by 10% so the later crop and resize never upsample.
const SAFETY_MARGIN: f64 = 1.1;

/// Resolution (dots per inch) at which a 210mm page renders to roughly
/// `target_width` pixels, plus a 10% margin.
///
/// `floor(floor(target_width / (210 / 25.4)) * 1.1)`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn plan_resolution(target_width: u32) -> u32 {
    let page_inches = PAGE_WIDTH_MM / MM_PER_INCH;
    let base = (f64::from(target_width) / page_inches).floor();
    // Bounded by u32::MAX * 1.1 / 8.27, which fits in u32.
    (base * SAFETY_MARGIN).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_width_plans_159() {
        assert_eq!(plan_resolution(1200), 159);
    }

    #[test]
    fn known_widths() {
        // 2480 / 8.2677 = 299.96 -> 299 * 1.1 = 328.9
        assert_eq!(plan_resolution(2480), 328);
        // 800 / 8.2677 = 96.76 -> 96 * 1.1 = 105.6
        assert_eq!(plan_resolution(800), 105);
        assert_eq!(plan_resolution(0), 0);
    }

    #[test]
    fn monotonic_in_target_width() {
        let mut prev = 0;
        for w in (100..4000).step_by(37) {
            let r = plan_resolution(w);
            assert!(r >= prev);
            prev = r;
        }
    }
}
