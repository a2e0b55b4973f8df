//! Run configuration.

use std::path::PathBuf;

use crate::detection::DEFAULT_THRESHOLD;
use crate::encoder::OutputFormat;
use crate::error::{Error, Result};
use crate::geometry::WatermarkRule;
use crate::logo::LogoAnchor;
use crate::resolution::plan_resolution;

/// Size budget for lossless artifacts: 10 MiB.
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// How pages are cropped to their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropPolicy {
    /// Each page is cropped to its own content bounds.
    #[default]
    PerPage,
    /// All pages share the widest left/right bounds in the document; top and
    /// bottom stay per page. Gives uniform margins at the cost of a second pass.
    Unified,
}

/// Options for one document run.
///
/// Resolved once from caller input and only read afterwards; derived values
/// such as the render resolution are recomputed by methods, never stored.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Output width cap in pixels. Wider pages are downscaled.
    pub target_width: u32,
    /// Explicit render resolution. `None` plans it from `target_width`.
    pub resolution: Option<u32>,
    /// Pages rendered and transformed per renderer call.
    pub batch_size: usize,
    /// Stack all pages into one tall image instead of one artifact per page.
    pub merge: bool,
    /// Formats written for every artifact.
    pub formats: Vec<OutputFormat>,
    /// Logo placement mode on document pages.
    pub logo_anchor: LogoAnchor,
    /// Content crop policy.
    pub crop_policy: CropPolicy,
    /// Watermark rectangle rule.
    pub watermark: WatermarkRule,
    /// Luminance below which a pixel counts as content.
    pub content_threshold: u8,
    /// Budget for lossless artifacts, in bytes.
    pub max_output_bytes: u64,
    /// Width the size ladder downscales to before giving up on lossless.
    pub downscale_cap: u32,
    /// Largest merge canvas, in pixels, that will be attempted.
    pub max_merge_pixels: u64,
    /// Directory receiving the final artifacts.
    pub output_dir: PathBuf,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_width: 1200,
            resolution: None,
            batch_size: 5,
            merge: false,
            formats: vec![OutputFormat::WebP],
            logo_anchor: LogoAnchor::BottomRight,
            crop_policy: CropPolicy::PerPage,
            watermark: WatermarkRule::default(),
            content_threshold: DEFAULT_THRESHOLD,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            downscale_cap: 1200,
            max_merge_pixels: 300_000_000,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl ProcessingConfig {
    /// Resolution pages are rendered at.
    #[must_use]
    pub fn render_resolution(&self) -> u32 {
        self.resolution
            .unwrap_or_else(|| plan_resolution(self.target_width))
    }

    /// Reject configurations no run could satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 {
            return Err(Error::InvalidConfig("target width must be positive".into()));
        }
        if self.render_resolution() == 0 {
            return Err(Error::InvalidConfig(format!(
                "render resolution is zero for target width {}",
                self.target_width
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".into()));
        }
        if self.formats.is_empty() {
            return Err(Error::InvalidConfig("no output format selected".into()));
        }
        if self.downscale_cap == 0 {
            return Err(Error::InvalidConfig("downscale cap must be positive".into()));
        }
        Ok(())
    }
}
