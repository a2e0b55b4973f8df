//! Remove fixed-position watermarks from rendered document pages.
//!
//! Each page has a corner rectangle filled with its sampled background color
//! and feathered into the surroundings. A replacement logo can optionally be
//! recolored and stamped in its place. The page is then cropped to its content
//! and downscaled to a target width. Pages are processed in batches, flushed
//! to a temporary store between batches, and written either one file per page
//! or merged into a single tall image, with PNG output kept under a byte
//! budget by a compression ladder.
//!
//! # Quick Start
//!
//! ```no_run
//! use page_watermark_removal::{remove_watermark, load_logo};
//! use std::path::Path;
//!
//! let img = image::open("slide.png").unwrap().to_rgb8();
//! let logo = load_logo(Path::new("logo.png")).unwrap();
//! let cleaned = remove_watermark(img, Some(&logo));
//! cleaned.save("slide_clean.png").unwrap();
//! ```
//!
//! # Documents
//!
//! Anything that can hand back rendered pages implements [`PageRenderer`].
//! [`DirectoryRenderer`] reads one image file per page, and with the `pdf`
//! feature `PdfRenderer` rasterizes PDF pages through MuPDF.
//!
//! ```no_run
//! use page_watermark_removal::{DirectoryRenderer, Engine, OutputFormat, ProcessingConfig};
//! use std::path::Path;
//!
//! let config = ProcessingConfig {
//!     merge: true,
//!     formats: vec![OutputFormat::Png],
//!     ..ProcessingConfig::default()
//! };
//! let engine = Engine::new(config).unwrap();
//! let pages = DirectoryRenderer::new(Path::new("pages")).unwrap();
//! let output = engine.process_document(&pages).unwrap();
//! for warning in &output.warnings {
//!     eprintln!("{warning}");
//! }
//! ```

#![deny(missing_docs)]

pub mod batch;
pub mod blending;
pub mod config;
pub mod detection;
pub mod encoder;
mod engine;
pub mod error;
pub mod geometry;
pub mod logo;
pub mod pipeline;
pub mod render;
pub mod resolution;
pub mod sampling;
pub mod storage;

pub use batch::{BatchController, DocumentOutput};
pub use config::{CropPolicy, ProcessingConfig};
pub use encoder::{Artifact, EncodeBudget, OutputFormat};
pub use engine::{
    default_output_path, is_supported_image, load_logo, merge_images, process_document,
    remove_watermark, Engine, ProcessResult,
};
pub use error::{Error, Result, Warning};
pub use geometry::{Rect, WatermarkRule};
pub use logo::LogoAnchor;
pub use render::{open_document, DirectoryRenderer, PageRenderer, RasterRenderer};
#[cfg(feature = "pdf")]
pub use render::PdfRenderer;
pub use resolution::plan_resolution;
