//! Error and warning types for the page-watermark-removal crate.

use std::path::PathBuf;

/// Fatal errors: any of these aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source document, a rendered page, or the logo could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded (document, page N, logo).
        what: String,
        /// Underlying cause.
        reason: String,
    },

    /// The processing configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Build a [`Error::Decode`] from anything displayable.
    pub fn decode(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Recovered, non-fatal conditions reported alongside successful output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    /// The computed watermark rectangle had zero area; the page was left untouched.
    #[error("page {page}: watermark region is degenerate, removal skipped")]
    DegenerateRegion {
        /// Zero-based page index (0 for single images).
        page: usize,
    },

    /// The lossless artifact is still over budget; it was kept and a lossy sibling written.
    #[error(
        "{} is {bytes} bytes, over the {limit} byte budget; kept as the full-quality original",
        path.display()
    )]
    LosslessOverBudget {
        /// The retained lossless artifact.
        path: PathBuf,
        /// Its size in bytes.
        bytes: u64,
        /// The configured budget.
        limit: u64,
    },

    /// Even the floor-quality lossy sibling exceeds the budget.
    #[error(
        "{} is {bytes} bytes at quality {quality}, budget of {limit} bytes unattainable",
        path.display()
    )]
    EncodeBudgetExceeded {
        /// The best-effort lossy artifact.
        path: PathBuf,
        /// Its size in bytes.
        bytes: u64,
        /// The configured budget.
        limit: u64,
        /// The floor quality it was encoded at.
        quality: u8,
    },

    /// The merge canvas could not be allocated; pages were written separately.
    #[error("cannot allocate {width}x{height} merge canvas, wrote pages separately")]
    MergeAllocation {
        /// Requested canvas width.
        width: u32,
        /// Requested canvas height.
        height: u32,
    },

    /// The merged image is too large for a requested format; pages were written separately.
    #[error("{width}x{height} merged image exceeds the {format} size limit, wrote pages separately")]
    MergeUnencodable {
        /// Stacked width.
        width: u32,
        /// Stacked height.
        height: u64,
        /// Extension of the format that cannot hold it.
        format: &'static str,
    },

    /// The lossless artifact is over budget, but no lossy sibling can be encoded at its size.
    #[error("{}: {width}x{height} is too large for a JPEG fallback, kept lossless only", path.display())]
    LossyFallbackSkipped {
        /// The retained lossless artifact.
        path: PathBuf,
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let decode = Error::decode("page 3", "truncated stream");
        let msg = decode.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("truncated stream"));
    }

    #[test]
    fn warning_display_messages() {
        let w = Warning::MergeAllocation {
            width: 1200,
            height: 90_000,
        };
        assert!(w.to_string().contains("1200x90000"));

        let w = Warning::EncodeBudgetExceeded {
            path: PathBuf::from("out/merged_compressed.jpg"),
            bytes: 11_000_000,
            limit: 10_485_760,
            quality: 60,
        };
        let msg = w.to_string();
        assert!(msg.contains("merged_compressed.jpg"));
        assert!(msg.contains("quality 60"));

        let w = Warning::MergeUnencodable {
            width: 1200,
            height: 20_000,
            format: "webp",
        };
        assert!(w.to_string().contains("webp size limit"));
    }
}
