//! Region replacement with feathered edges, and alpha compositing.
//!
//! A filled region is blended back into its surroundings along each edge:
//!
//! `blended = original * (1 - weight) + fill * weight`
//!
//! where `original` is read one feather width further out, so already
//! blended pixels are never blended again.

use image::{Rgb, RgbImage, RgbaImage};

use crate::geometry::Rect;
use crate::sampling::Color;

/// Upper bound on the feather band, in pixels.
const MAX_FEATHER: u32 = 10;

/// Feather width for a region: `min(10, width / 4, height / 4)`.
#[must_use]
pub fn feather_width(region: &Rect) -> u32 {
    MAX_FEATHER
        .min(region.width() / 4)
        .min(region.height() / 4)
}

/// Cubic ease `t^2 (3 - 2t)` at step `i` of `feather`, with `t = (i + 1) / feather`.
#[must_use]
pub fn smoothstep(i: u32, feather: u32) -> f64 {
    let t = f64::from(i + 1) / f64::from(feather);
    t * t * (3.0 - 2.0 * t)
}

fn mix(original: Rgb<u8>, fill: Color, weight: f64) -> Rgb<u8> {
    let mut out = [0u8; 3];
    for (ch, value) in out.iter_mut().enumerate() {
        let v = f64::from(original[ch]) * (1.0 - weight) + f64::from(fill[ch]) * weight;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            *value = v.clamp(0.0, 255.0) as u8;
        }
    }
    Rgb(out)
}

/// Fill `region` with `fill` and feather its edges into the surrounding pixels.
///
/// Only pixels inside `region` are written. Left and top edges blend when
/// there is a full feather width of image beyond them; right and bottom edges
/// are skipped when the region reaches (or comes within a feather width of)
/// the image edge. Empty regions are a no-op.
pub fn feather_fill(image: &mut RgbImage, region: &Rect, fill: Color) {
    if region.is_empty() {
        return;
    }
    let (img_w, img_h) = image.dimensions();

    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            image.put_pixel(x, y, fill);
        }
    }

    let feather = feather_width(region);
    if feather == 0 {
        return;
    }

    if region.x1 >= feather {
        for i in 0..feather {
            let weight = smoothstep(i, feather);
            let x = region.x1 + i;
            for y in region.y1..region.y2 {
                let original = *image.get_pixel(x - feather, y);
                image.put_pixel(x, y, mix(original, fill, weight));
            }
        }
    }

    if region.y1 >= feather {
        for i in 0..feather {
            let weight = smoothstep(i, feather);
            let y = region.y1 + i;
            for x in region.x1..region.x2 {
                let original = *image.get_pixel(x, y - feather);
                image.put_pixel(x, y, mix(original, fill, weight));
            }
        }
    }

    if region.x2 + feather < img_w {
        for i in 0..feather {
            let weight = 1.0 - smoothstep(i, feather);
            let x = region.x2 - 1 - i;
            for y in region.y1..region.y2 {
                let original = *image.get_pixel(x + feather, y);
                image.put_pixel(x, y, mix(original, fill, weight));
            }
        }
    }

    if region.y2 + feather < img_h {
        for i in 0..feather {
            let weight = 1.0 - smoothstep(i, feather);
            let y = region.y2 - 1 - i;
            for x in region.x1..region.x2 {
                let original = *image.get_pixel(x, y + feather);
                image.put_pixel(x, y, mix(original, fill, weight));
            }
        }
    }
}

/// Composite `overlay` onto `image` with its top-left corner at (`x`, `y`),
/// using straight alpha. Parts falling outside `image` are clipped.
pub fn overlay_rgba(image: &mut RgbImage, overlay: &RgbaImage, x: i64, y: i64) {
    let (img_w, img_h) = (i64::from(image.width()), i64::from(image.height()));
    for (ox, oy, src) in overlay.enumerate_pixels() {
        let (dx, dy) = (x + i64::from(ox), y + i64::from(oy));
        if dx < 0 || dy < 0 || dx >= img_w || dy >= img_h {
            continue;
        }
        let alpha = u32::from(src[3]);
        if alpha == 0 {
            continue;
        }
        // Bounds checked above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let dst = image.get_pixel_mut(dx as u32, dy as u32);
        for (d, s) in dst.0.iter_mut().zip(src.0) {
            let blended = (u32::from(s) * alpha + u32::from(*d) * (255 - alpha) + 127) / 255;
            #[allow(clippy::cast_possible_truncation)]
            {
                *d = blended as u8;
            }
        }
    }
}
