//! Batch-sequential document processing.
//!
//! Pages are rendered in fixed-size groups, transformed, and flushed to a
//! [`PageStore`] before the next group is rendered, so peak memory is one
//! batch plus (in merge mode) the output canvas.

use std::path::{Path, PathBuf};

use image::imageops;
use image::{RgbImage, RgbaImage};
use log::{info, warn};

use crate::config::{CropPolicy, ProcessingConfig};
use crate::encoder::{self, Artifact, EncodeBudget, EncodeOutcome};
use crate::error::{Error, Result, Warning};
use crate::geometry::Rect;
use crate::pipeline::{Page, PagePipeline};
use crate::render::PageRenderer;
use crate::storage::PageStore;

/// Everything a document run produced.
#[derive(Debug, Default)]
pub struct DocumentOutput {
    /// Written files, in write order.
    pub artifacts: Vec<Artifact>,
    /// Recovered conditions worth telling the caller about.
    pub warnings: Vec<Warning>,
    /// True if the pages ended up in a single merged image.
    pub merged: bool,
    /// Pages processed.
    pub page_count: usize,
}

impl DocumentOutput {
    /// Paths of every written artifact.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.artifacts.iter().map(|a| a.path.as_path()).collect()
    }
}

/// 1-based inclusive page ranges covering `total` pages in groups of `batch_size`.
#[must_use]
pub fn batch_ranges(total: usize, batch_size: usize) -> Vec<(usize, usize)> {
    let batch_size = batch_size.max(1);
    (0..total)
        .step_by(batch_size)
        .map(|start| (start + 1, (start + batch_size).min(total)))
        .collect()
}

/// Result of stacking pages vertically.
#[derive(Debug)]
pub enum Canvas {
    /// The stacked image.
    Merged(RgbImage),
    /// The canvas could not be allocated.
    Unallocated {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Allocate a white `width` x `height` canvas, or `None` if it exceeds
/// `max_pixels` or the allocator refuses.
fn allocate_canvas(width: u32, height: u32, max_pixels: u64) -> Option<RgbImage> {
    let pixels = u64::from(width).checked_mul(u64::from(height))?;
    if pixels > max_pixels {
        return None;
    }
    let len = usize::try_from(pixels.checked_mul(3)?).ok()?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 255u8);
    RgbImage::from_raw(width, height, buf)
}

fn page_dimensions(paths: &[PathBuf]) -> Result<Vec<(u32, u32)>> {
    paths
        .iter()
        .map(|p| image::image_dimensions(p).map_err(|e| Error::decode(p.display().to_string(), e)))
        .collect()
}

fn stacked_size(dims: &[(u32, u32)]) -> (u32, u64) {
    let width = dims.iter().map(|&(w, _)| w).max().unwrap_or(0);
    let height = dims.iter().map(|&(_, h)| u64::from(h)).sum();
    (width, height)
}

/// Width and height of the image files stacked vertically, read from their
/// headers only.
///
/// # Errors
///
/// Returns [`Error::Decode`] if a header cannot be read.
pub fn stacked_dimensions(paths: &[PathBuf]) -> Result<(u32, u64)> {
    Ok(stacked_size(&page_dimensions(paths)?))
}

/// Stack image files top to bottom in the given order, each centered
/// horizontally on a white canvas as wide as the widest image.
///
/// Only dimensions are read up front; images are loaded one at a time while
/// pasting.
///
/// # Errors
///
/// Returns [`Error::Decode`] if an image cannot be read.
pub fn stack_files(paths: &[PathBuf], max_pixels: u64) -> Result<Canvas> {
    let dims = page_dimensions(paths)?;
    let (width, total_height) = stacked_size(&dims);
    info!("merge canvas {width}x{total_height}");

    let Some(mut canvas) = u32::try_from(total_height)
        .ok()
        .and_then(|height| allocate_canvas(width, height, max_pixels))
    else {
        return Ok(Canvas::Unallocated {
            width,
            height: u32::try_from(total_height).unwrap_or(u32::MAX),
        });
    };

    let mut y = 0i64;
    for (path, (w, h)) in paths.iter().zip(dims) {
        let page = image::open(path)
            .map_err(|e| Error::decode(path.display().to_string(), e))?
            .to_rgb8();
        let x = i64::from((width - w) / 2);
        imageops::replace(&mut canvas, &page, x, y);
        y += i64::from(h);
    }
    Ok(Canvas::Merged(canvas))
}

/// Drives the page pipeline over a whole document.
pub struct BatchController<'a, R: PageRenderer + ?Sized> {
    renderer: &'a R,
    config: &'a ProcessingConfig,
    pipeline: PagePipeline<'a>,
}

impl<'a, R: PageRenderer + ?Sized> BatchController<'a, R> {
    /// Controller for one run. `config` must already be validated.
    #[must_use]
    pub fn new(
        renderer: &'a R,
        logo: Option<&'a RgbaImage>,
        config: &'a ProcessingConfig,
    ) -> Self {
        Self {
            renderer,
            config,
            pipeline: PagePipeline::new(config, logo),
        }
    }

    /// Render, transform, and write every page of the document.
    ///
    /// # Errors
    ///
    /// Any render, decode, or write failure aborts the run. Intermediate
    /// pages are always cleaned up, and artifacts written before the failure
    /// are removed.
    pub fn run(&self) -> Result<DocumentOutput> {
        let total = self.renderer.page_count()?;
        if total == 0 {
            return Err(Error::decode("document", "no pages"));
        }
        std::fs::create_dir_all(&self.config.output_dir)?;

        let mut store = PageStore::new_in(&self.config.output_dir)?;
        let mut warnings = Vec::new();
        let mut bounds = Vec::with_capacity(total);
        let resolution = self.config.render_resolution();
        let ranges = batch_ranges(total, self.config.batch_size);

        info!(
            "{total} pages at resolution {resolution}, {} batches of up to {}",
            ranges.len(),
            self.config.batch_size
        );

        for (batch_no, &(first, last)) in ranges.iter().enumerate() {
            info!("batch {}: pages {first}-{last} of {total}", batch_no + 1);
            let images = self.renderer.render(resolution, first, last)?;
            let expected = last - first + 1;
            if images.len() != expected {
                return Err(Error::decode(
                    format!("pages {first}-{last}"),
                    format!("renderer returned {} of {expected} pages", images.len()),
                ));
            }

            let pages = images
                .into_iter()
                .enumerate()
                .map(|(i, image)| Page::rendered(first - 1 + i, image))
                .collect();

            for page in self.transform(pages) {
                if let Some(warning) = page.warning {
                    warn!("{warning}");
                    warnings.push(warning);
                }
                bounds.push((page.index, page.bounds));
                store.put(page.index, &page.image)?;
            }
        }

        if self.config.crop_policy == CropPolicy::Unified {
            self.apply_unified_crop(&mut store, &bounds)?;
        }

        let mut outcome = EncodeOutcome::default();
        let merged = match self.write_outputs(&store, &mut outcome, &mut warnings) {
            Ok(merged) => merged,
            Err(e) => {
                outcome.discard();
                return Err(e);
            }
        };
        warnings.extend(outcome.warnings);

        Ok(DocumentOutput {
            artifacts: outcome.artifacts,
            warnings,
            merged,
            page_count: store.len(),
        })
    }

    #[cfg(feature = "parallel")]
    fn transform(&self, pages: Vec<Page>) -> Vec<Page> {
        use rayon::prelude::*;
        let pipeline = self.pipeline;
        let mut done: Vec<Page> = pages
            .into_par_iter()
            .map(|page| pipeline.process(page))
            .collect();
        done.sort_by_key(|page| page.index);
        done
    }

    #[cfg(not(feature = "parallel"))]
    fn transform(&self, pages: Vec<Page>) -> Vec<Page> {
        pages
            .into_iter()
            .map(|page| self.pipeline.process(page))
            .collect()
    }

    /// Crop every stored page to the document-wide left/right bounds and its
    /// own top/bottom bounds.
    fn apply_unified_crop(
        &self,
        store: &mut PageStore,
        bounds: &[(usize, Option<Rect>)],
    ) -> Result<()> {
        let measured = bounds.iter().filter_map(|(_, b)| *b);
        let left = measured.clone().map(|b| b.x1).min().unwrap_or(0);
        let right = measured.map(|b| b.x2).max().unwrap_or(u32::MAX);
        info!("unified horizontal bounds {left}..{right}");

        for &(index, page_bounds) in bounds {
            let image = store.get(index)?;
            let (w, h) = image.dimensions();
            let own = page_bounds.unwrap_or_else(|| Rect::full(w, h));
            let crop = Rect::clamped(
                i64::from(left),
                i64::from(own.y1),
                i64::from(right),
                i64::from(own.y2),
                w,
                h,
            );
            let mut page = Page::rendered(index, image);
            self.pipeline.finish(&mut page, crop);
            store.put(index, &page.image)?;
        }
        Ok(())
    }

    /// Write merged or per-page artifacts. Returns whether the merge happened.
    fn write_outputs(
        &self,
        store: &PageStore,
        outcome: &mut EncodeOutcome,
        warnings: &mut Vec<Warning>,
    ) -> Result<bool> {
        let dir = self.config.output_dir.as_path();
        let budget = EncodeBudget::from(self.config);
        let formats = &self.config.formats;

        if self.config.merge {
            let paths = store.paths();
            let (width, height) = stacked_dimensions(&paths)?;
            let warning = match formats.iter().find(|f| !f.fits(width, height)) {
                Some(format) => Warning::MergeUnencodable {
                    width,
                    height,
                    format: format.extension(),
                },
                None => match stack_files(&paths, self.config.max_merge_pixels)? {
                    Canvas::Merged(canvas) => {
                        outcome.extend(encoder::write_formats(
                            &canvas, dir, "merged", formats, &budget,
                        )?);
                        return Ok(true);
                    }
                    Canvas::Unallocated { width, height } => {
                        Warning::MergeAllocation { width, height }
                    }
                },
            };
            warn!("{warning}");
            warnings.push(warning);
        }

        for index in store.indices() {
            let page = store.get(index)?;
            let stem = format!("page_{:02}", index + 1);
            outcome.extend(encoder::write_formats(&page, dir, &stem, formats, &budget)?);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn ranges_cover_document_without_overlap() {
        assert_eq!(batch_ranges(12, 5), [(1, 5), (6, 10), (11, 12)]);
        assert_eq!(batch_ranges(5, 5), [(1, 5)]);
        assert_eq!(batch_ranges(1, 5), [(1, 1)]);
        assert!(batch_ranges(0, 5).is_empty());
    }

    #[test]
    fn canvas_respects_pixel_ceiling() {
        assert!(allocate_canvas(100, 100, 9_999).is_none());
        let canvas = allocate_canvas(100, 100, 10_000).unwrap();
        assert_eq!(*canvas.get_pixel(50, 50), Rgb([255, 255, 255]));
    }

    #[test]
    fn stack_centers_narrow_pages() {
        let dir = TempDir::new().unwrap();
        let wide = dir.path().join("a.png");
        let narrow = dir.path().join("b.png");
        RgbImage::from_pixel(10, 4, Rgb([0, 0, 0])).save(&wide).unwrap();
        RgbImage::from_pixel(6, 3, Rgb([9, 9, 9])).save(&narrow).unwrap();

        let Canvas::Merged(canvas) = stack_files(&[wide, narrow], u64::MAX).unwrap() else {
            panic!("expected merged canvas");
        };
        assert_eq!(canvas.dimensions(), (10, 7));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(1, 5), Rgb([255, 255, 255]));
        assert_eq!(*canvas.get_pixel(2, 5), Rgb([9, 9, 9]));
        assert_eq!(*canvas.get_pixel(7, 6), Rgb([9, 9, 9]));
        assert_eq!(*canvas.get_pixel(8, 6), Rgb([255, 255, 255]));
    }

    #[test]
    fn stack_reports_unallocatable_canvas() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("a.png");
        RgbImage::new(10, 10).save(&page).unwrap();
        let canvas = stack_files(&[page.clone(), page], 150).unwrap();
        assert!(matches!(
            canvas,
            Canvas::Unallocated {
                width: 10,
                height: 20
            }
        ));
    }
}
