//! Logo recoloring and placement.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::geometry::{scale_to_resolution, Rect};
use crate::sampling::Color;

/// Pixels with alpha below this become fully transparent.
const TRANSPARENT_BELOW: u8 = 10;
/// Channels above this (all three) count as near-white canvas.
const NEAR_WHITE: u8 = 200;

/// Logo edge length at the calibration resolution, for document pages.
pub const PAGE_LOGO_SIZE: u32 = 90;
/// Right inset at the calibration resolution for [`LogoAnchor::BottomRight`].
pub const PAGE_LOGO_RIGHT: u32 = 30;
/// Bottom inset at the calibration resolution for [`LogoAnchor::BottomRight`].
pub const PAGE_LOGO_BOTTOM: u32 = 25;
/// Logo edge length for single images, in pixels.
pub const IMAGE_LOGO_SIZE: u32 = 40;

/// Where a logo goes on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoAnchor {
    /// Inset from the page's bottom-right corner.
    #[default]
    BottomRight,
    /// Centered inside the watermark rectangle.
    WatermarkCenter,
}

/// Remap a logo's palette onto `background`.
///
/// Nearly transparent pixels become transparent background, near-white
/// pixels become opaque background, everything else is kept. A logo drawn
/// on white therefore blends into any page color.
#[must_use]
pub fn recolor(logo: &RgbaImage, background: Color) -> RgbaImage {
    let [br, bg, bb] = background.0;
    let mut out = RgbaImage::new(logo.width(), logo.height());
    for (src, dst) in logo.pixels().zip(out.pixels_mut()) {
        let Rgba([r, g, b, a]) = *src;
        *dst = if a < TRANSPARENT_BELOW {
            Rgba([br, bg, bb, 0])
        } else if r > NEAR_WHITE && g > NEAR_WHITE && b > NEAR_WHITE {
            Rgba([br, bg, bb, 255])
        } else {
            *src
        };
    }
    out
}

/// Top-left position and edge length of a square logo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoPlacement {
    /// Left edge; may be negative on pages smaller than the logo.
    pub x: i64,
    /// Top edge; may be negative on pages smaller than the logo.
    pub y: i64,
    /// Edge length in pixels.
    pub size: u32,
}

impl LogoPlacement {
    /// Placement on a document page rendered at `resolution`.
    #[must_use]
    pub fn for_page(
        anchor: LogoAnchor,
        page_width: u32,
        page_height: u32,
        watermark: &Rect,
        resolution: u32,
    ) -> Self {
        let size = scale_to_resolution(PAGE_LOGO_SIZE, resolution);
        match anchor {
            LogoAnchor::BottomRight => Self {
                x: i64::from(page_width)
                    - i64::from(size)
                    - i64::from(scale_to_resolution(PAGE_LOGO_RIGHT, resolution)),
                y: i64::from(page_height)
                    - i64::from(size)
                    - i64::from(scale_to_resolution(PAGE_LOGO_BOTTOM, resolution)),
                size,
            },
            LogoAnchor::WatermarkCenter => Self::centered(watermark, size),
        }
    }

    /// Logo of `size` centered in `watermark`.
    #[must_use]
    pub fn centered(watermark: &Rect, size: u32) -> Self {
        let cx = (i64::from(watermark.x1) + i64::from(watermark.x2)) / 2;
        let cy = (i64::from(watermark.y1) + i64::from(watermark.y2)) / 2;
        let half = i64::from(size / 2);
        Self {
            x: cx - half,
            y: cy - half,
            size,
        }
    }

    /// The placed logo's footprint, clamped to the page.
    #[must_use]
    pub fn rect(&self, page_width: u32, page_height: u32) -> Rect {
        let size = i64::from(self.size);
        Rect::clamped(
            self.x,
            self.y,
            self.x + size,
            self.y + size,
            page_width,
            page_height,
        )
    }
}

/// Recolor `logo` onto `background` and resample it to the placement size.
#[must_use]
pub fn prepare(logo: &RgbaImage, background: Color, size: u32) -> RgbaImage {
    let recolored = recolor(logo, background);
    if recolored.dimensions() == (size, size) {
        return recolored;
    }
    imageops::resize(&recolored, size, size, FilterType::Lanczos3)
}
