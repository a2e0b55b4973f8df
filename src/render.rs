//! Page renderers: the source of rasterized pages.
//!
//! A renderer hands back ordered RGB pages for a 1-based, inclusive page
//! range. PDF rasterization through MuPDF is available with the `pdf` feature.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::debug;

use crate::error::{Error, Result};
use crate::geometry::CALIBRATION_RESOLUTION;

#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "pdf")]
pub use pdf::PdfRenderer;

/// Source of rendered pages.
pub trait PageRenderer {
    /// Number of pages in the document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the document cannot be read.
    fn page_count(&self) -> Result<usize>;

    /// Render pages `first_page..=last_page` (1-based) at `resolution`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a page cannot be rendered.
    fn render(&self, resolution: u32, first_page: usize, last_page: usize)
        -> Result<Vec<RgbImage>>;
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// True if `bytes` start with a PDF header.
#[must_use]
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Pick a renderer for an encoded document: `PdfRenderer` for PDF bytes,
/// [`RasterRenderer`] for anything else.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the document cannot be opened, or
/// [`Error::UnsupportedFormat`] for PDF input when the `pdf` feature is off.
pub fn open_document(bytes: &[u8]) -> Result<Box<dyn PageRenderer>> {
    if is_pdf(bytes) {
        #[cfg(feature = "pdf")]
        return Ok(Box::new(PdfRenderer::from_bytes(bytes)?));
        #[cfg(not(feature = "pdf"))]
        return Err(Error::UnsupportedFormat(
            "PDF input requires the `pdf` feature".into(),
        ));
    }
    Ok(Box::new(RasterRenderer::from_bytes(bytes)?))
}

fn check_range(first_page: usize, last_page: usize, count: usize) -> Result<()> {
    if first_page == 0 || first_page > last_page || last_page > count {
        return Err(Error::decode(
            format!("pages {first_page}-{last_page}"),
            format!("document has {count} pages"),
        ));
    }
    Ok(())
}

/// Rescale a raster assumed to be at `source` resolution to `target`.
fn rescale(page: RgbImage, source: u32, target: u32) -> RgbImage {
    if source == target || source == 0 {
        return page;
    }
    let scale = |v: u32| {
        let scaled = u64::from(v) * u64::from(target) / u64::from(source);
        u32::try_from(scaled.max(1)).unwrap_or(u32::MAX)
    };
    let (w, h) = (scale(page.width()), scale(page.height()));
    debug!(
        "rescaling {}x{} @{source} to {w}x{h} @{target}",
        page.width(),
        page.height()
    );
    imageops::resize(&page, w, h, FilterType::Lanczos3)
}

/// A single already-rasterized page.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    page: RgbImage,
    source_resolution: u32,
}

impl RasterRenderer {
    /// Wrap a decoded page assumed to be at the calibration resolution (300).
    #[must_use]
    pub fn new(page: RgbImage) -> Self {
        Self {
            page,
            source_resolution: CALIBRATION_RESOLUTION,
        }
    }

    /// Decode a page from encoded image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a supported image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let page = image::load_from_memory(bytes)
            .map_err(|e| Error::decode("document", e))?
            .to_rgb8();
        Ok(Self::new(page))
    }

    /// Resolution the raster was produced at.
    #[must_use]
    pub fn with_source_resolution(mut self, resolution: u32) -> Self {
        self.source_resolution = resolution;
        self
    }
}

impl PageRenderer for RasterRenderer {
    fn page_count(&self) -> Result<usize> {
        Ok(1)
    }

    fn render(
        &self,
        resolution: u32,
        first_page: usize,
        last_page: usize,
    ) -> Result<Vec<RgbImage>> {
        check_range(first_page, last_page, 1)?;
        Ok(vec![rescale(
            self.page.clone(),
            self.source_resolution,
            resolution,
        )])
    }
}

/// Pages stored as image files, one per page, in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryRenderer {
    pages: Vec<PathBuf>,
    source_resolution: u32,
}

impl DirectoryRenderer {
    /// Collect the supported image files in `dir`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be listed.
    pub fn new(dir: &Path) -> Result<Self> {
        let mut pages: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| is_supported_image(p))
            .collect();
        pages.sort();
        Ok(Self::from_paths(pages))
    }

    /// Use `pages` as given, in order.
    #[must_use]
    pub fn from_paths(pages: Vec<PathBuf>) -> Self {
        Self {
            pages,
            source_resolution: CALIBRATION_RESOLUTION,
        }
    }

    /// Resolution the page files were produced at.
    #[must_use]
    pub fn with_source_resolution(mut self, resolution: u32) -> Self {
        self.source_resolution = resolution;
        self
    }
}

impl PageRenderer for DirectoryRenderer {
    fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn render(
        &self,
        resolution: u32,
        first_page: usize,
        last_page: usize,
    ) -> Result<Vec<RgbImage>> {
        check_range(first_page, last_page, self.pages.len())?;
        self.pages[first_page - 1..last_page]
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let page = image::open(path)
                    .map_err(|e| {
                        Error::decode(
                            format!("page {} ({})", first_page + i, path.display()),
                            e,
                        )
                    })?
                    .to_rgb8();
                Ok(rescale(page, self.source_resolution, resolution))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn pdf_header_is_detected() {
        assert!(is_pdf(b"%PDF-1.7\n"));
        assert!(!is_pdf(b"\x89PNG\r\n"));
        assert!(!is_pdf(b""));
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn pdf_without_feature_is_unsupported() {
        let err = open_document(b"%PDF-1.4\n").err().unwrap();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn non_pdf_bytes_open_as_single_raster() {
        let mut bytes = Vec::new();
        RgbImage::new(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let renderer = open_document(&bytes).unwrap();
        assert_eq!(renderer.page_count().unwrap(), 1);
    }

    #[test]
    fn raster_renderer_rescales_to_requested_resolution() {
        let renderer = RasterRenderer::new(RgbImage::from_pixel(600, 300, Rgb([255, 255, 255])));
        let pages = renderer.render(150, 1, 1).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].dimensions(), (300, 150));

        let pages = renderer.render(300, 1, 1).unwrap();
        assert_eq!(pages[0].dimensions(), (600, 300));
    }

    #[test]
    fn raster_renderer_rejects_garbage() {
        let err = RasterRenderer::from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn out_of_range_pages_are_decode_errors() {
        let renderer = RasterRenderer::new(RgbImage::new(10, 10));
        assert!(matches!(renderer.render(300, 1, 2), Err(Error::Decode { .. })));
        assert!(matches!(renderer.render(300, 0, 1), Err(Error::Decode { .. })));
    }

    #[test]
    fn directory_renderer_orders_pages_by_name() {
        let dir = TempDir::new().unwrap();
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(8, 8, Rgb([shade, shade, shade]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let renderer = DirectoryRenderer::new(dir.path()).unwrap();
        assert_eq!(renderer.page_count().unwrap(), 3);

        let pages = renderer.render(300, 2, 3).unwrap();
        assert_eq!(pages[0].get_pixel(0, 0)[0], 20);
        assert_eq!(pages[1].get_pixel(0, 0)[0], 30);
    }

    #[test]
    fn corrupt_page_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page1.png"), b"broken").unwrap();
        let renderer = DirectoryRenderer::new(dir.path()).unwrap();
        let err = renderer.render(300, 1, 1).unwrap_err();
        assert!(err.to_string().contains("page 1"));
    }
}
