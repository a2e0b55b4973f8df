//! Background color estimation around a rectangular region.
//!
//! Up to four bands (left, top, right, bottom) just outside the region are
//! collected and reduced with a per-channel median, so text or antialiasing
//! that leaks into a band does not shift the estimate.

use image::{Rgb, RgbImage};

use crate::geometry::Rect;

/// Representative background color.
pub type Color = Rgb<u8>;

/// Returned when no sample band fits inside the image.
pub const FALLBACK_COLOR: Color = Rgb([240, 240, 240]);

/// Depth of each sample band, measured outward from the region.
const BAND_DEPTH: i64 = 40;
/// Gap between the region edge and the start of a band. Also trims the
/// band ends so corners of the region are not sampled.
const BAND_INSET: i64 = 5;
/// Right and bottom bands are skipped when the region is this close to the edge.
const EDGE_MARGIN: i64 = 10;

/// Estimate the background color surrounding `region`.
///
/// Returns [`FALLBACK_COLOR`] when every band is degenerate, for example when
/// `region` covers the whole image.
#[must_use]
pub fn sample_background(image: &RgbImage, region: &Rect) -> Color {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let (x1, y1, x2, y2) = (
        i64::from(region.x1),
        i64::from(region.y1),
        i64::from(region.x2),
        i64::from(region.y2),
    );

    let mut bands = Vec::with_capacity(4);

    // left
    bands.push((
        (x1 - BAND_DEPTH).max(0),
        (y1 + BAND_INSET).max(0),
        (x1 - BAND_INSET).max(0),
        (y2 - BAND_INSET).min(h),
    ));
    // top
    bands.push((
        (x1 + BAND_INSET).max(0),
        (y1 - BAND_DEPTH).max(0),
        (x2 - BAND_INSET).min(w),
        (y1 - BAND_INSET).max(0),
    ));
    if x2 < w - EDGE_MARGIN {
        bands.push((
            (x2 + BAND_INSET).min(w),
            (y1 + BAND_INSET).max(0),
            (x2 + BAND_DEPTH).min(w),
            (y2 - BAND_INSET).min(h),
        ));
    }
    if y2 < h - EDGE_MARGIN {
        bands.push((
            (x1 + BAND_INSET).max(0),
            (y2 + BAND_INSET).min(h),
            (x2 - BAND_INSET).min(w),
            (y2 + BAND_DEPTH).min(h),
        ));
    }

    let mut channels: [Vec<u8>; 3] = Default::default();
    for (bx1, by1, bx2, by2) in bands {
        let band = Rect::clamped(bx1, by1, bx2, by2, image.width(), image.height());
        if band.is_empty() {
            continue;
        }
        for y in band.y1..band.y2 {
            for x in band.x1..band.x2 {
                let px = image.get_pixel(x, y);
                for (ch, values) in channels.iter_mut().enumerate() {
                    values.push(px[ch]);
                }
            }
        }
    }

    if channels[0].is_empty() {
        return FALLBACK_COLOR;
    }

    let [r, g, b] = channels;
    Rgb([median(r), median(g), median(b)])
}

/// Median of a non-empty sample, averaging (rounded down) the two middle
/// values for even-length input.
fn median(mut values: Vec<u8>) -> u8 {
    debug_assert!(!values.is_empty());
    let mid = values.len() / 2;
    let odd = values.len() % 2 == 1;
    let (lower, upper, _) = values.select_nth_unstable(mid);
    let upper = *upper;
    if odd {
        return upper;
    }
    let below = lower.iter().copied().max().unwrap_or(upper);
    u8::try_from((u16::from(below) + u16::from(upper)) / 2).unwrap_or(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(w: u32, h: u32, c: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(c))
    }

    #[test]
    fn full_image_region_returns_fallback() {
        let img = uniform(200, 100, [10, 20, 30]);
        let color = sample_background(&img, &Rect::full(200, 100));
        assert_eq!(color, FALLBACK_COLOR);
    }

    #[test]
    fn uniform_background_is_recovered() {
        let img = uniform(400, 300, [250, 248, 245]);
        let region = Rect { x1: 150, y1: 100, x2: 250, y2: 200 };
        assert_eq!(sample_background(&img, &region), Rgb([250, 248, 245]));
    }

    #[test]
    fn median_ignores_minority_outliers() {
        let mut img = uniform(400, 300, [255, 255, 255]);
        // Dark text bleeding into part of the left band.
        for y in 100..200 {
            for x in 115..130 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let region = Rect { x1: 150, y1: 100, x2: 250, y2: 200 };
        assert_eq!(sample_background(&img, &region), Rgb([255, 255, 255]));
    }

    #[test]
    fn region_pixels_are_never_sampled() {
        let mut img = uniform(400, 300, [200, 200, 200]);
        let region = Rect { x1: 150, y1: 100, x2: 250, y2: 200 };
        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        assert_eq!(sample_background(&img, &region), Rgb([200, 200, 200]));
    }

    #[test]
    fn region_near_bottom_right_skips_outer_bands() {
        let mut img = uniform(300, 300, [100, 100, 100]);
        let region = Rect { x1: 150, y1: 150, x2: 292, y2: 292 };
        // Right and bottom bands would start here; both are skipped.
        for i in 0..300 {
            for d in 297..300 {
                img.put_pixel(d, i, Rgb([0, 0, 0]));
                img.put_pixel(i, d, Rgb([0, 0, 0]));
            }
        }
        assert_eq!(sample_background(&img, &region), Rgb([100, 100, 100]));
    }

    #[test]
    fn median_of_even_sample_averages_middle_values() {
        assert_eq!(median(vec![10, 20]), 15);
        assert_eq!(median(vec![1, 4, 2, 3]), 2);
        assert_eq!(median(vec![9, 1, 5]), 5);
        assert_eq!(median(vec![255, 254]), 254);
    }
}
