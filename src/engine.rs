//! Public entry points: single images, whole documents, and merging.

use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};
use log::{info, warn};

use crate::batch::{stack_files, stacked_dimensions, BatchController, Canvas, DocumentOutput};
use crate::config::ProcessingConfig;
use crate::encoder::{self, Artifact, EncodeBudget, EncodeOutcome, OutputFormat};
use crate::error::{Error, Result, Warning};
use crate::geometry::WatermarkRule;
use crate::logo::{LogoPlacement, IMAGE_LOGO_SIZE};
use crate::pipeline::clean_region;
use crate::render::{open_document, PageRenderer};

pub use crate::render::is_supported_image;

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Files written.
    pub artifacts: Vec<Artifact>,
    /// Recovered conditions, such as size budget fallbacks.
    pub warnings: Vec<Warning>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            message,
        }
    }
}

/// Remove the NotebookLM badge from a single image and optionally stamp a
/// logo, centered in the badge region, in its place.
///
/// No cropping or resizing happens here.
#[must_use]
pub fn remove_watermark(image: RgbImage, logo: Option<&RgbaImage>) -> RgbImage {
    clean_image(image, logo).0
}

fn clean_image(mut image: RgbImage, logo: Option<&RgbaImage>) -> (RgbImage, Option<Warning>) {
    let (w, h) = image.dimensions();
    let region = WatermarkRule::NotebookLm.region(w, h, 0);
    let logo = logo.map(|logo| (logo, LogoPlacement::centered(&region, IMAGE_LOGO_SIZE)));
    let cleaned = clean_region(&mut image, &region, logo);
    let warning = cleaned
        .degenerate
        .then_some(Warning::DegenerateRegion { page: 0 });
    (image, warning)
}

/// Process an encoded document with the given configuration.
///
/// PDF bytes are rasterized page by page when the `pdf` feature is enabled;
/// anything else is decoded as a single raster page.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the bytes are not a readable document, or any
/// fatal error from the run.
pub fn process_document(
    document: &[u8],
    logo: Option<&RgbaImage>,
    config: &ProcessingConfig,
) -> Result<DocumentOutput> {
    config.validate()?;
    let renderer = open_document(document)?;
    BatchController::new(renderer.as_ref(), logo, config).run()
}

/// Load a logo image as RGBA.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the file cannot be read.
pub fn load_logo(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)
        .map_err(|e| Error::decode(format!("logo {}", path.display()), e))?
        .to_rgba8())
}

/// Stack image files vertically into one image at `output`, honoring the
/// size budget when writing PNG.
///
/// # Errors
///
/// Returns an error if an input cannot be read, the stacked image is too
/// large for the output format or the pixel limit, or the output cannot be
/// written.
pub fn merge_images(
    inputs: &[PathBuf],
    output: &Path,
    budget: &EncodeBudget,
    max_pixels: u64,
) -> Result<EncodeOutcome> {
    if inputs.is_empty() {
        return Err(Error::InvalidConfig("no images to merge".into()));
    }
    let format = OutputFormat::from_path(output)?;
    let (width, height) = stacked_dimensions(inputs)?;
    if !format.fits(width, height) {
        return Err(Error::InvalidConfig(format!(
            "merged image {width}x{height} exceeds the {} size limit",
            format.extension()
        )));
    }
    match stack_files(inputs, max_pixels)? {
        Canvas::Merged(canvas) => encoder::write_artifact(&canvas, output, format, budget),
        Canvas::Unallocated { width, height } => Err(Error::InvalidConfig(format!(
            "merged image {width}x{height} exceeds the {max_pixels} pixel limit"
        ))),
    }
}

/// Watermark removal engine bound to one configuration and optional logo.
///
/// Create once and reuse for many images or documents.
#[derive(Debug, Clone)]
pub struct Engine {
    config: ProcessingConfig,
    logo: Option<RgbaImage>,
}

impl Engine {
    /// Create an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unusable configurations.
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, logo: None })
    }

    /// Stamp `logo` wherever a watermark is removed.
    #[must_use]
    pub fn with_logo(mut self, logo: RgbaImage) -> Self {
        self.logo = Some(logo);
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Remove the watermark from a single image.
    #[must_use]
    pub fn remove_watermark(&self, image: RgbImage) -> RgbImage {
        remove_watermark(image, self.logo.as_ref())
    }

    /// Process every page `renderer` provides.
    ///
    /// # Errors
    ///
    /// Any render, decode, or write failure aborts the whole document.
    pub fn process_document<R: PageRenderer + ?Sized>(&self, renderer: &R) -> Result<DocumentOutput> {
        BatchController::new(renderer, self.logo.as_ref(), &self.config).run()
    }

    /// Process a single image file: load, remove, save under the size budget.
    ///
    /// Returns a [`ProcessResult`] describing success or failure.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let format = match OutputFormat::from_path(output) {
            Ok(f) => f,
            Err(e) => return ProcessResult::failed(input, e.to_string()),
        };

        let image = match image::open(input) {
            Ok(img) => img.to_rgb8(),
            Err(e) => return ProcessResult::failed(input, format!("Failed to load: {e}")),
        };
        info!(
            "{}: {}x{}",
            input.display(),
            image.width(),
            image.height()
        );

        let (image, warning) = clean_image(image, self.logo.as_ref());

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ProcessResult::failed(
                        input,
                        format!("Failed to create output directory: {e}"),
                    );
                }
            }
        }

        let budget = EncodeBudget::from(&self.config);
        match encoder::write_artifact(&image, output, format, &budget) {
            Ok(outcome) => {
                let mut warnings: Vec<Warning> = warning.into_iter().collect();
                warnings.extend(outcome.warnings);
                let message = if warnings.is_empty() {
                    "Watermark removed".to_string()
                } else {
                    format!("Watermark removed with {} warning(s)", warnings.len())
                };
                ProcessResult {
                    path: input.to_path_buf(),
                    success: true,
                    artifacts: outcome.artifacts,
                    warnings,
                    message,
                }
            }
            Err(e) => ProcessResult::failed(input, format!("Failed to save: {e}")),
        }
    }

    /// Process all supported images in a directory.
    ///
    /// Uses parallel iteration when the `parallel` feature is enabled.
    /// Returns a [`ProcessResult`] for each image found.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let run = |input: &PathBuf| match input.file_name() {
            Some(name) => self.process_file(input, &output_dir.join(name)),
            None => ProcessResult::failed(input, "no file name".to_string()),
        };

        #[cfg(feature = "parallel")]
        let results: Vec<ProcessResult> = {
            use rayon::prelude::*;
            entries.par_iter().map(run).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<ProcessResult> = entries.iter().map(run).collect();

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!("{failed} of {} images failed", results.len());
        }
        results
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"slide.png"` becomes `"slide_clean.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_clean.{ext}"))
}
