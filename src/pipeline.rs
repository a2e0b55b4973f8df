//! Per-page transformation.
//!
//! A page moves through fixed stages:
//!
//! Rendered -> WatermarkRemoved -> LogoComposited (optional) -> Cropped -> Resized -> Finalized
//!
//! Under [`CropPolicy::Unified`] the pipeline stops after measuring content
//! bounds; cropping waits until every page has been measured.

use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};
use log::debug;

use crate::blending::{feather_fill, overlay_rgba};
use crate::config::{CropPolicy, ProcessingConfig};
use crate::detection::content_bounds;
use crate::error::Warning;
use crate::geometry::Rect;
use crate::logo::{self, LogoPlacement};
use crate::sampling::{sample_background, Color};

/// Where a page is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageStage {
    /// Raw raster from the renderer.
    Rendered,
    /// Watermark region filled and feathered.
    WatermarkRemoved,
    /// Logo stamped onto the page.
    LogoComposited,
    /// Cropped to content bounds.
    Cropped,
    /// Downscaled to the target width (or already narrow enough).
    Resized,
    /// Ready to persist or merge.
    Finalized,
}

/// One page of a document and what is known about it so far.
#[derive(Debug)]
pub struct Page {
    /// Zero-based document index, fixed at render time.
    pub index: usize,
    /// Current raster.
    pub image: RgbImage,
    /// Last completed stage.
    pub stage: PageStage,
    /// Content bounds, unioned with the logo footprint, once measured.
    pub bounds: Option<Rect>,
    /// Recovered problem on this page, if any.
    pub warning: Option<Warning>,
}

impl Page {
    /// A freshly rendered page.
    #[must_use]
    pub fn rendered(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            image,
            stage: PageStage::Rendered,
            bounds: None,
            warning: None,
        }
    }

    fn advance(&mut self, stage: PageStage) {
        debug!("page {}: {:?} -> {stage:?}", self.index + 1, self.stage);
        self.stage = stage;
    }
}

/// What [`clean_region`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleaned {
    /// Background color the region was filled with.
    pub background: Color,
    /// Footprint of the stamped logo, if one was placed.
    pub logo: Option<Rect>,
    /// The region was empty and nothing was filled.
    pub degenerate: bool,
}

/// Fill `region` with its surrounding background and optionally stamp a logo.
///
/// The logo is recolored against the sampled background before compositing.
pub fn clean_region(
    image: &mut RgbImage,
    region: &Rect,
    logo: Option<(&RgbaImage, LogoPlacement)>,
) -> Cleaned {
    let background = sample_background(image, region);
    let degenerate = region.is_empty();
    if !degenerate {
        feather_fill(image, region, background);
    }

    let logo = logo
        .filter(|(_, placement)| placement.size > 0)
        .map(|(logo, placement)| {
            let stamp = logo::prepare(logo, background, placement.size);
            overlay_rgba(image, &stamp, placement.x, placement.y);
            placement.rect(image.width(), image.height())
        });

    Cleaned {
        background,
        logo,
        degenerate,
    }
}

/// Proportional downscale to `width`, or `None` if the image is not wider.
#[must_use]
pub fn downscale_to_width(image: &RgbImage, width: u32) -> Option<RgbImage> {
    if image.width() <= width || width == 0 {
        return None;
    }
    let height = u64::from(image.height()) * u64::from(width) / u64::from(image.width());
    let height = u32::try_from(height.max(1)).unwrap_or(u32::MAX);
    Some(imageops::resize(image, width, height, FilterType::Lanczos3))
}

/// Applies the page stages under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct PagePipeline<'a> {
    config: &'a ProcessingConfig,
    logo: Option<&'a RgbaImage>,
    resolution: u32,
}

impl<'a> PagePipeline<'a> {
    /// Pipeline for pages rendered at the configuration's resolution.
    #[must_use]
    pub fn new(config: &'a ProcessingConfig, logo: Option<&'a RgbaImage>) -> Self {
        Self {
            config,
            logo,
            resolution: config.render_resolution(),
        }
    }

    /// Run every stage the crop policy allows before the whole document is known.
    #[must_use]
    pub fn process(&self, mut page: Page) -> Page {
        self.remove_watermark(&mut page);
        self.measure(&mut page);
        if self.config.crop_policy == CropPolicy::PerPage {
            let bounds = page.bounds.unwrap_or_else(|| {
                Rect::full(page.image.width(), page.image.height())
            });
            self.finish(&mut page, bounds);
        }
        page
    }

    /// Watermark removal and optional logo stamp.
    pub fn remove_watermark(&self, page: &mut Page) {
        let (w, h) = page.image.dimensions();
        let region = self.config.watermark.region(w, h, self.resolution);
        let logo = self.logo.map(|logo| {
            let placement =
                LogoPlacement::for_page(self.config.logo_anchor, w, h, &region, self.resolution);
            (logo, placement)
        });

        let cleaned = clean_region(&mut page.image, &region, logo);
        debug!(
            "page {}: watermark {region:?}, background {:?}",
            page.index + 1,
            cleaned.background.0
        );
        if cleaned.degenerate {
            page.warning = Some(Warning::DegenerateRegion { page: page.index });
        } else {
            page.advance(PageStage::WatermarkRemoved);
        }

        if let Some(logo_rect) = cleaned.logo {
            page.advance(PageStage::LogoComposited);
            page.bounds = Some(logo_rect);
        }
    }

    /// Measure content bounds, keeping any logo footprint inside them.
    pub fn measure(&self, page: &mut Page) {
        let content = content_bounds(&page.image, self.config.content_threshold);
        let bounds = page
            .bounds
            .map_or(content, |logo_rect| content.union(&logo_rect));
        debug!("page {}: content bounds {bounds:?}", page.index + 1);
        page.bounds = Some(bounds);
    }

    /// Crop to `crop`, downscale to the target width, and mark the page final.
    pub fn finish(&self, page: &mut Page, crop: Rect) {
        let (w, h) = page.image.dimensions();
        let crop = Rect::clamped(
            i64::from(crop.x1),
            i64::from(crop.y1),
            i64::from(crop.x2),
            i64::from(crop.y2),
            w,
            h,
        );
        if !crop.is_empty() && crop != Rect::full(w, h) {
            page.image =
                imageops::crop_imm(&page.image, crop.x1, crop.y1, crop.width(), crop.height())
                    .to_image();
        }
        page.advance(PageStage::Cropped);

        if let Some(resized) = downscale_to_width(&page.image, self.config.target_width) {
            debug!(
                "page {}: resized {}x{} -> {}x{}",
                page.index + 1,
                page.image.width(),
                page.image.height(),
                resized.width(),
                resized.height()
            );
            page.image = resized;
        }
        page.advance(PageStage::Resized);
        page.advance(PageStage::Finalized);
    }
}
