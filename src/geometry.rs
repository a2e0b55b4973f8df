//! Rectangles and the watermark region rules.

/// Resolution the watermark geometry was measured at.
pub const CALIBRATION_RESOLUTION: u32 = 300;

/// Axis-aligned integer rectangle, half-open on the high end.
///
/// Constructors clamp to image bounds, so `x2 >= x1` and `y2 >= y1` always hold.
/// A zero-area rectangle means "no region".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x1: u32,
    /// Top edge (inclusive).
    pub y1: u32,
    /// Right edge (exclusive).
    pub x2: u32,
    /// Bottom edge (exclusive).
    pub y2: u32,
}

impl Rect {
    /// Build a rectangle from signed corners, clamped to a `width` x `height` image.
    #[must_use]
    pub fn clamped(x1: i64, y1: i64, x2: i64, y2: i64, width: u32, height: u32) -> Self {
        let cx = |v: i64| clamp_coord(v, width);
        let cy = |v: i64| clamp_coord(v, height);
        let (x1, y1) = (cx(x1), cy(y1));
        Self {
            x1,
            y1,
            x2: cx(x2).max(x1),
            y2: cy(y2).max(y1),
        }
    }

    /// The whole image.
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: width,
            y2: height,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// True for zero-area rectangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Smallest rectangle covering both. Empty operands are ignored.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

fn clamp_coord(v: i64, max: u32) -> u32 {
    u32::try_from(v.clamp(0, i64::from(max))).unwrap_or(max)
}

/// Scale a length measured at [`CALIBRATION_RESOLUTION`] to `resolution`, rounding down.
#[must_use]
pub fn scale_to_resolution(length: u32, resolution: u32) -> u32 {
    let scaled = u64::from(length) * u64::from(resolution) / u64::from(CALIBRATION_RESOLUTION);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// How the watermark rectangle is derived from page dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkRule {
    /// Flush with the bottom-right corner; size given at the calibration
    /// resolution and scaled by `resolution / 300`.
    PageCorner {
        /// Width at 300.
        width: u32,
        /// Height at 300.
        height: u32,
    },
    /// Fixed-pixel NotebookLM badge region for exported slide images.
    ///
    /// 150x35 inset 9px/8px from the right/bottom when the image is at least
    /// 1000px wide, otherwise 150x40 inset 1px/1px.
    NotebookLm,
}

impl Default for WatermarkRule {
    fn default() -> Self {
        Self::PageCorner {
            width: 450,
            height: 130,
        }
    }
}

impl WatermarkRule {
    /// Compute the clamped watermark rectangle for a `width` x `height` page
    /// rendered at `resolution`.
    #[must_use]
    pub fn region(&self, width: u32, height: u32, resolution: u32) -> Rect {
        let (w, h) = (i64::from(width), i64::from(height));
        match *self {
            Self::PageCorner {
                width: wm_w,
                height: wm_h,
            } => {
                let wm_w = i64::from(scale_to_resolution(wm_w, resolution));
                let wm_h = i64::from(scale_to_resolution(wm_h, resolution));
                Rect::clamped(w - wm_w, h - wm_h, w, h, width, height)
            }
            Self::NotebookLm => {
                let (wm_w, wm_h, right, bottom) = if width >= 1000 {
                    (150, 35, 9, 8)
                } else {
                    (150, 40, 1, 1)
                };
                Rect::clamped(
                    w - wm_w - right,
                    h - wm_h - bottom,
                    w - right,
                    h - bottom,
                    width,
                    height,
                )
            }
        }
    }
}
