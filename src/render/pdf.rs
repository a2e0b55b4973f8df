//! PDF rasterization through MuPDF.

use image::RgbImage;
use log::debug;
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::{check_range, PageRenderer};
use crate::error::{Error, Result};

/// PDF user space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders pages of a PDF held in memory.
pub struct PdfRenderer {
    doc: Document,
    pages: usize,
}

impl PdfRenderer {
    /// Open a PDF from its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if MuPDF cannot open the document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::from_bytes(bytes, "application/pdf")
            .map_err(|e| Error::decode("PDF document", e))?;
        let pages = doc
            .page_count()
            .map_err(|e| Error::decode("PDF document", e))?;
        let pages =
            usize::try_from(pages).map_err(|e| Error::decode("PDF page count", e))?;
        debug!("opened PDF with {pages} pages");
        Ok(Self { doc, pages })
    }
}

/// Copy the RGB channels of a pixmap into an image, dropping any alpha and
/// row padding.
fn pixmap_to_rgb(pixmap: &Pixmap) -> Option<RgbImage> {
    let n = usize::try_from(pixmap.n()).ok()?;
    if n < 3 {
        return None;
    }
    let width = u32::try_from(pixmap.width()).ok()?;
    let height = u32::try_from(pixmap.height()).ok()?;
    let stride = usize::try_from(pixmap.stride()).ok()?;
    let samples = pixmap.samples();

    let row_bytes = usize::try_from(width).ok()? * n;
    let rows = usize::try_from(height).ok()?;
    if row_bytes > stride || samples.len() < stride.saturating_mul(rows) {
        return None;
    }

    let mut out = Vec::with_capacity(row_bytes / n * 3 * rows);
    for row in samples.chunks(stride).take(rows) {
        let row = &row[..row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    RgbImage::from_raw(width, height, out)
}

impl PageRenderer for PdfRenderer {
    fn page_count(&self) -> Result<usize> {
        Ok(self.pages)
    }

    fn render(
        &self,
        resolution: u32,
        first_page: usize,
        last_page: usize,
    ) -> Result<Vec<RgbImage>> {
        check_range(first_page, last_page, self.pages)?;
        #[allow(clippy::cast_precision_loss)]
        let scale = resolution as f32 / POINTS_PER_INCH;
        let transform = Matrix::new_scale(scale, scale);
        let rgb = Colorspace::device_rgb();

        (first_page..=last_page)
            .map(|number| {
                let what = format!("page {number}");
                let index = i32::try_from(number - 1).map_err(|e| Error::decode(&what, e))?;
                let page = self
                    .doc
                    .load_page(index)
                    .map_err(|e| Error::decode(&what, e))?;
                let pixmap = page
                    .to_pixmap(&transform, &rgb, false, false)
                    .map_err(|e| Error::decode(&what, e))?;
                let image = pixmap_to_rgb(&pixmap)
                    .ok_or_else(|| Error::decode(&what, "unexpected pixmap layout"))?;
                debug!("{what}: {}x{} at {resolution}", image.width(), image.height());
                Ok(image)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Two blank 144x72pt pages. The cross-reference table is left out;
    /// MuPDF rebuilds it on open.
    const TWO_PAGES: &[u8] = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 144 72] >> endobj
4 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 144 72] >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

    #[test]
    fn counts_and_renders_pages_at_resolution() {
        let renderer = PdfRenderer::from_bytes(TWO_PAGES).unwrap();
        assert_eq!(renderer.page_count().unwrap(), 2);

        let pages = renderer.render(144, 1, 2).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].dimensions(), (288, 144));
        assert_eq!(*pages[1].get_pixel(10, 10), Rgb([255, 255, 255]));
    }

    #[test]
    fn out_of_range_is_a_decode_error() {
        let renderer = PdfRenderer::from_bytes(TWO_PAGES).unwrap();
        assert!(matches!(renderer.render(72, 2, 3), Err(Error::Decode { .. })));
    }
}
