//! Content bounds detection for auto-cropping.
//!
//! A projection-based bound: each row and column is reduced to its darkest
//! luminance, and the first/last rows and columns darker than the threshold
//! delimit the content. This is sufficient for pages with one content mass
//! and clear margins; it does not separate disconnected regions.

use image::RgbImage;

use crate::geometry::Rect;

/// Default luminance threshold: anything darker counts as content.
pub const DEFAULT_THRESHOLD: u8 = 240;

/// Padding added around detected content on every side.
pub const CONTENT_PADDING: u32 = 30;

/// ITU-R 601-2 luma in fixed point, rounded to nearest.
#[must_use]
pub fn luminance(px: &image::Rgb<u8>) -> u8 {
    let l = (u32::from(px[0]) * 19_595 + u32::from(px[1]) * 38_470 + u32::from(px[2]) * 7_471
        + 0x8000)
        >> 16;
    u8::try_from(l).unwrap_or(u8::MAX)
}

/// Tightest rectangle around pixels darker than `threshold`, padded by
/// [`CONTENT_PADDING`] and clamped to the image.
///
/// A blank page (no row or column below the threshold) yields the full image.
#[must_use]
pub fn content_bounds(image: &RgbImage, threshold: u8) -> Rect {
    let (w, h) = image.dimensions();
    let mut row_min = vec![u8::MAX; h as usize];
    let mut col_min = vec![u8::MAX; w as usize];

    for (x, y, px) in image.enumerate_pixels() {
        let l = luminance(px);
        let (xi, yi) = (x as usize, y as usize);
        if l < row_min[yi] {
            row_min[yi] = l;
        }
        if l < col_min[xi] {
            col_min[xi] = l;
        }
    }

    let (Some((top, bottom)), Some((left, right))) =
        (content_span(&row_min, threshold), content_span(&col_min, threshold))
    else {
        return Rect::full(w, h);
    };

    let pad = i64::from(CONTENT_PADDING);
    Rect::clamped(
        left - pad,
        top - pad,
        right + 1 + pad,
        bottom + 1 + pad,
        w,
        h,
    )
}

/// First and last index whose minimum falls below `threshold`.
fn content_span(minima: &[u8], threshold: u8) -> Option<(i64, i64)> {
    let first = minima.iter().position(|&m| m < threshold)?;
    let last = minima.iter().rposition(|&m| m < threshold)?;
    Some((i64::try_from(first).ok()?, i64::try_from(last).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn page_with_block(w: u32, h: u32, block: Rect) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if x >= block.x1 && x < block.x2 && y >= block.y1 && y < block.y2 {
                Rgb([20, 20, 20])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn luminance_matches_known_values() {
        assert_eq!(luminance(&Rgb([255, 255, 255])), 255);
        assert_eq!(luminance(&Rgb([0, 0, 0])), 0);
        assert_eq!(luminance(&Rgb([255, 0, 0])), 76);
        assert_eq!(luminance(&Rgb([0, 255, 0])), 150);
    }

    #[test]
    fn blank_page_returns_full_image() {
        let img = RgbImage::from_pixel(320, 200, Rgb([250, 250, 250]));
        assert_eq!(content_bounds(&img, DEFAULT_THRESHOLD), Rect::full(320, 200));
    }

    #[test]
    fn block_is_padded_by_thirty() {
        let block = Rect { x1: 100, y1: 120, x2: 200, y2: 260 };
        let img = page_with_block(400, 500, block);
        let bounds = content_bounds(&img, DEFAULT_THRESHOLD);
        assert_eq!(bounds, Rect { x1: 70, y1: 90, x2: 230, y2: 290 });
    }

    #[test]
    fn padding_is_clamped_to_image() {
        let block = Rect { x1: 5, y1: 10, x2: 390, y2: 495 };
        let img = page_with_block(400, 500, block);
        assert_eq!(content_bounds(&img, DEFAULT_THRESHOLD), Rect::full(400, 500));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        img.put_pixel(100, 100, Rgb([240, 240, 240]));
        assert_eq!(content_bounds(&img, 240), Rect::full(200, 200));

        img.put_pixel(100, 100, Rgb([239, 239, 239]));
        assert_eq!(
            content_bounds(&img, 240),
            Rect { x1: 70, y1: 70, x2: 131, y2: 131 }
        );
    }
}
