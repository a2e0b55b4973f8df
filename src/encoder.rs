//! Artifact encoding under a size budget.
//!
//! Lossless PNG output goes through a retry ladder when it exceeds the budget:
//!
//! 1. re-encode with maximum compression,
//! 2. downscale to the width cap and re-encode,
//! 3. write a JPEG sibling, stepping quality down from 85 to 60.
//!
//! The PNG is always kept, whatever its size. Every fallback is reported as a
//! [`Warning`], including a skipped sibling when the image is beyond JPEG's
//! dimension limit.

use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use log::{info, warn};

use crate::config::ProcessingConfig;
use crate::error::{Error, Result, Warning};
use crate::pipeline::downscale_to_width;

/// JPEG quality for regular artifacts and the first fallback attempt.
pub const JPEG_QUALITY: u8 = 85;
/// Lowest quality the fallback ladder will try.
const JPEG_FLOOR: u8 = 60;
/// Quality decrement per fallback attempt.
const JPEG_STEP: u8 = 5;

/// Output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Lossless PNG, subject to the size budget.
    Png,
    /// Lossy JPEG at quality 85.
    Jpeg,
    /// Lossless WebP.
    WebP,
}

impl OutputFormat {
    /// Every supported format.
    pub const ALL: [Self; 3] = [Self::Png, Self::Jpeg, Self::WebP];

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Largest width or height the encoder accepts.
    #[must_use]
    pub fn max_dimension(self) -> u32 {
        match self {
            Self::Png => 0x7fff_ffff,
            Self::Jpeg => 65_535,
            Self::WebP => 16_383,
        }
    }

    /// True if a `width` x `height` image can be written in this format.
    #[must_use]
    pub fn fits(self, width: u32, height: u64) -> bool {
        let max = self.max_dimension();
        width > 0 && width <= max && height > 0 && height <= u64::from(max)
    }

    /// Format implied by a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for missing or unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A file written by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Where it was written.
    pub path: PathBuf,
    /// Its encoding.
    pub format: OutputFormat,
    /// Size on disk.
    pub bytes: u64,
    /// JPEG quality, for lossy artifacts.
    pub quality: Option<u8>,
}

/// Size limits applied to lossless artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeBudget {
    /// Maximum artifact size in bytes.
    pub max_bytes: u64,
    /// Width the ladder downscales to.
    pub downscale_cap: u32,
}

impl Default for EncodeBudget {
    fn default() -> Self {
        Self {
            max_bytes: crate::config::DEFAULT_MAX_OUTPUT_BYTES,
            downscale_cap: 1200,
        }
    }
}

impl From<&ProcessingConfig> for EncodeBudget {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            max_bytes: config.max_output_bytes,
            downscale_cap: config.downscale_cap,
        }
    }
}

/// Artifacts and warnings from one or more encode calls.
#[derive(Debug, Default)]
pub struct EncodeOutcome {
    /// Files written, in order.
    pub artifacts: Vec<Artifact>,
    /// Budget fallbacks taken.
    pub warnings: Vec<Warning>,
}

impl EncodeOutcome {
    /// Append another outcome.
    pub fn extend(&mut self, other: Self) {
        self.artifacts.extend(other.artifacts);
        self.warnings.extend(other.warnings);
    }

    /// Delete every artifact written so far. Used to undo a failed run.
    pub fn discard(&mut self) {
        for artifact in self.artifacts.drain(..) {
            if let Err(e) = std::fs::remove_file(&artifact.path) {
                warn!("could not remove {}: {e}", artifact.path.display());
            }
        }
        self.warnings.clear();
    }
}

/// Encode as PNG with the given compression level.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails.
pub fn encode_png(image: &RgbImage, compression: CompressionType) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

/// Encode as baseline JPEG at `quality` (1-100).
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(image)?;
    Ok(buf)
}

/// Encode as lossless WebP.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails.
pub fn encode_webp(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<u64> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(bytes.len() as u64)
}

/// Sibling path for the lossy fallback: `<stem>_compressed.jpg`.
#[must_use]
pub fn fallback_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!("{stem}_compressed.jpg"))
}

/// Write `image` as PNG at `path`, applying the size ladder.
///
/// # Errors
///
/// Returns an error if encoding or writing fails. Budget overruns are
/// warnings, not errors.
pub fn write_png_within_budget(
    image: &RgbImage,
    path: &Path,
    budget: &EncodeBudget,
) -> Result<EncodeOutcome> {
    let mut outcome = EncodeOutcome::default();

    let mut current = Cow::Borrowed(image);
    let mut png = encode_png(image, CompressionType::Best)?;

    if png.len() as u64 > budget.max_bytes && image.width() > budget.downscale_cap {
        info!(
            "{}: {} bytes over budget, downscaling {}px -> {}px",
            path.display(),
            png.len(),
            image.width(),
            budget.downscale_cap
        );
        if let Some(resized) = downscale_to_width(image, budget.downscale_cap) {
            png = encode_png(&resized, CompressionType::Best)?;
            current = Cow::Owned(resized);
        }
    }

    let bytes = write_file(path, &png)?;
    outcome.artifacts.push(Artifact {
        path: path.to_path_buf(),
        format: OutputFormat::Png,
        bytes,
        quality: None,
    });
    if bytes <= budget.max_bytes {
        return Ok(outcome);
    }
    drop(png);

    let warning = Warning::LosslessOverBudget {
        path: path.to_path_buf(),
        bytes,
        limit: budget.max_bytes,
    };
    warn!("{warning}");
    outcome.warnings.push(warning);

    if !OutputFormat::Jpeg.fits(current.width(), u64::from(current.height())) {
        let warning = Warning::LossyFallbackSkipped {
            path: path.to_path_buf(),
            width: current.width(),
            height: current.height(),
        };
        warn!("{warning}");
        outcome.warnings.push(warning);
        return Ok(outcome);
    }

    match write_lossy_sibling(&current, &fallback_path(path), budget) {
        Ok((artifact, warning)) => {
            outcome.warnings.extend(warning);
            outcome.artifacts.push(artifact);
            Ok(outcome)
        }
        Err(e) => {
            outcome.discard();
            Err(e)
        }
    }
}

/// Step the JPEG quality down until the sibling fits the budget or the floor
/// is reached.
fn write_lossy_sibling(
    image: &RgbImage,
    path: &Path,
    budget: &EncodeBudget,
) -> Result<(Artifact, Option<Warning>)> {
    let mut quality = JPEG_QUALITY;
    let mut jpg = encode_jpeg(image, quality)?;
    while jpg.len() as u64 > budget.max_bytes && quality > JPEG_FLOOR {
        quality -= JPEG_STEP;
        jpg = encode_jpeg(image, quality)?;
    }

    let bytes = write_file(path, &jpg)?;
    info!(
        "{}: lossy fallback {bytes} bytes at quality {quality}",
        path.display()
    );
    let warning = (bytes > budget.max_bytes).then(|| Warning::EncodeBudgetExceeded {
        path: path.to_path_buf(),
        bytes,
        limit: budget.max_bytes,
        quality,
    });
    if let Some(warning) = &warning {
        warn!("{warning}");
    }
    let artifact = Artifact {
        path: path.to_path_buf(),
        format: OutputFormat::Jpeg,
        bytes,
        quality: Some(quality),
    };
    Ok((artifact, warning))
}

/// Write `image` to `path` in `format`. PNG goes through the size ladder.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn write_artifact(
    image: &RgbImage,
    path: &Path,
    format: OutputFormat,
    budget: &EncodeBudget,
) -> Result<EncodeOutcome> {
    let (bytes, quality) = match format {
        OutputFormat::Png => return write_png_within_budget(image, path, budget),
        OutputFormat::Jpeg => (encode_jpeg(image, JPEG_QUALITY)?, Some(JPEG_QUALITY)),
        OutputFormat::WebP => (encode_webp(image)?, None),
    };
    let bytes = write_file(path, &bytes)?;
    info!("wrote {} ({bytes} bytes)", path.display());
    Ok(EncodeOutcome {
        artifacts: vec![Artifact {
            path: path.to_path_buf(),
            format,
            bytes,
            quality,
        }],
        warnings: Vec::new(),
    })
}

/// Write `image` as `<dir>/<stem>.<ext>` for every format in `formats`.
///
/// On failure, artifacts already written by this call are removed.
///
/// # Errors
///
/// Returns the first encode or write error.
pub fn write_formats(
    image: &RgbImage,
    dir: &Path,
    stem: &str,
    formats: &[OutputFormat],
    budget: &EncodeBudget,
) -> Result<EncodeOutcome> {
    let mut outcome = EncodeOutcome::default();
    for &format in formats {
        let path = dir.join(format!("{stem}.{}", format.extension()));
        match write_artifact(image, &path, format, budget) {
            Ok(written) => outcome.extend(written),
            Err(e) => {
                outcome.discard();
                return Err(e);
            }
        }
    }
    Ok(outcome)
}
