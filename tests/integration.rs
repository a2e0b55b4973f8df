use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use image::{ImageFormat, Rgb, RgbImage};
use page_watermark_removal::blending::{feather_width, smoothstep};
use page_watermark_removal::pipeline::clean_region;
use page_watermark_removal::{
    plan_resolution, process_document, CropPolicy, DirectoryRenderer, Engine, Error, OutputFormat,
    PageRenderer, ProcessingConfig, RasterRenderer, Rect, Result, Warning, WatermarkRule,
};
use tempfile::TempDir;

/// Renderer over in-memory pages that records every range it was asked for.
struct RecordingRenderer {
    pages: Vec<RgbImage>,
    calls: Mutex<Vec<(u32, usize, usize)>>,
}

impl RecordingRenderer {
    fn new(pages: Vec<RgbImage>) -> Self {
        Self {
            pages,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(usize, usize)> {
        let calls = self.calls.lock().unwrap();
        calls.iter().map(|&(_, first, last)| (first, last)).collect()
    }

    fn resolutions(&self) -> Vec<u32> {
        let calls = self.calls.lock().unwrap();
        calls.iter().map(|&(resolution, _, _)| resolution).collect()
    }
}

impl PageRenderer for RecordingRenderer {
    fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn render(&self, resolution: u32, first_page: usize, last_page: usize) -> Result<Vec<RgbImage>> {
        self.calls
            .lock()
            .unwrap()
            .push((resolution, first_page, last_page));
        Ok(self.pages[first_page - 1..last_page].to_vec())
    }
}

fn page_with_block(w: u32, h: u32, x: (u32, u32), y: (u32, u32), shade: u8) -> RgbImage {
    RgbImage::from_fn(w, h, |px, py| {
        if (x.0..x.1).contains(&px) && (y.0..y.1).contains(&py) {
            Rgb([shade, shade, shade])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

fn noise(w: u32, h: u32, seed: u32) -> RgbImage {
    let mut state = seed | 1;
    RgbImage::from_fn(w, h, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [a, b, c, _] = state.to_le_bytes();
        // Keep every pixel dark enough to count as content.
        Rgb([a / 2, b / 2, c / 2])
    })
}

fn config_in(dir: &Path) -> ProcessingConfig {
    ProcessingConfig {
        resolution: Some(300),
        formats: vec![OutputFormat::Png],
        output_dir: dir.to_path_buf(),
        ..ProcessingConfig::default()
    }
}

fn open_rgb(path: &Path) -> RgbImage {
    image::open(path).unwrap().to_rgb8()
}

#[test]
fn planned_resolution_reaches_the_renderer() {
    let dir = TempDir::new().unwrap();
    let pages = (0..2u8)
        .map(|i| page_with_block(200, 300, (50, 150), (20, 100), i * 10))
        .collect();
    let renderer = RecordingRenderer::new(pages);
    let config = ProcessingConfig {
        resolution: None,
        batch_size: 1,
        ..config_in(dir.path())
    };

    Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();
    assert_eq!(renderer.resolutions(), [plan_resolution(1200); 2]);
    assert_eq!(renderer.resolutions()[0], 159);
}

#[test]
fn twelve_pages_render_in_three_batches() {
    let dir = TempDir::new().unwrap();
    let pages = (0..12u8)
        .map(|i| page_with_block(200, 300, (50, 150), (20, 100), i * 10))
        .collect();
    let renderer = RecordingRenderer::new(pages);

    let engine = Engine::new(config_in(dir.path())).unwrap();
    let output = engine.process_document(&renderer).unwrap();

    assert_eq!(renderer.calls(), [(1, 5), (6, 10), (11, 12)]);
    assert_eq!(output.page_count, 12);
    assert!(!output.merged);
    let names: Vec<String> = output
        .paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("page_01.png"));
    assert_eq!(names.last().map(String::as_str), Some("page_12.png"));
    assert_eq!(names.len(), 12);
}

#[test]
fn full_size_page_is_cleaned_and_cropped() {
    let dir = TempDir::new().unwrap();
    let mut page = page_with_block(2000, 3000, (300, 1700), (400, 2400), 30);
    // Badge inside the 450x130 corner region.
    for y in 2900..2980 {
        for x in 1600..1950 {
            page.put_pixel(x, y, Rgb([120, 120, 120]));
        }
    }
    let mut bytes = Vec::new();
    page.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    let config = ProcessingConfig {
        target_width: 2000,
        ..config_in(dir.path())
    };
    let output = process_document(&bytes, None, &config).unwrap();
    assert!(output.warnings.is_empty());

    let cleaned = open_rgb(&dir.path().join("page_01.png"));
    assert_eq!(cleaned.dimensions(), (1460, 2060));
    assert_eq!(*cleaned.get_pixel(30, 30), Rgb([30, 30, 30]));
    assert_eq!(*cleaned.get_pixel(1459, 2059), Rgb([255, 255, 255]));
}

/// Page whose left side is a gentle horizontal gradient and whose area above
/// the corner region is a lighter shade varying across the width, with a grey
/// badge in the corner region itself.
fn tinted_page(region: Rect) -> RgbImage {
    RgbImage::from_fn(2000, 3000, |x, y| {
        let v = if x < region.x1 {
            100 + ((region.x1 - x) / 4).min(10)
        } else if y < region.y1 {
            240 + (x - region.x1) / 50
        } else {
            120
        };
        let v = u8::try_from(v).unwrap();
        Rgb([v, v, v])
    })
}

/// Values must move monotonically from `edge` toward `fill` with no step
/// larger than the biggest smoothstep increment allows.
fn assert_smooth_ramp(values: &[u8], fill: u8, what: &str) {
    let feather = u32::try_from(values.len() - 1).unwrap();
    let max_increment = (1..feather)
        .map(|i| smoothstep(i, feather) - smoothstep(i - 1, feather))
        .fold(smoothstep(0, feather), f64::max);
    let span = f64::from(values.iter().map(|v| v.abs_diff(fill)).max().unwrap());
    let bound = (span * max_increment).ceil() + 2.0;

    let rising = fill >= values[0];
    for pair in values.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if rising {
            assert!(b >= a, "{what}: {values:?} not rising toward {fill}");
        } else {
            assert!(b <= a, "{what}: {values:?} not falling toward {fill}");
        }
        assert!(f64::from(a.abs_diff(b)) <= bound, "{what}: step {a}->{b} over {bound}");
    }
    assert_eq!(*values.last().unwrap(), fill, "{what}");
}

#[test]
fn watermark_region_blends_without_seam() {
    let region = WatermarkRule::default().region(2000, 3000, 300);
    let mut page = tinted_page(region);
    let before = page.clone();
    let cleaned = clean_region(&mut page, &region, None);
    let fill = cleaned.background[0];
    let feather = feather_width(&region);
    assert_eq!(feather, 10);

    // Left edge, along a row away from the top feather band.
    let y = (region.y1 + region.y2) / 2;
    let row: Vec<u8> = (region.x1 - 1..region.x1 + feather)
        .map(|x| page.get_pixel(x, y)[0])
        .collect();
    assert_smooth_ramp(&row, fill, "left edge");

    // Top edge, in columns away from the left feather band.
    for x in [region.x1 + 100, region.x1 + 300, region.x2 - 5] {
        let column: Vec<u8> = (region.y1 - 1..region.y1 + feather)
            .map(|y| page.get_pixel(x, y)[0])
            .collect();
        assert_smooth_ramp(&column, fill, &format!("top edge at x={x}"));
    }

    // The badge is gone and nothing outside the region moved.
    assert_eq!(page.get_pixel(1800, 2950)[0], fill);
    for (x, y, px) in page.enumerate_pixels() {
        if x < region.x1 || y < region.y1 {
            assert_eq!(px, before.get_pixel(x, y));
        }
    }
}

#[test]
fn oversized_merge_keeps_png_and_writes_jpeg_sibling() {
    let dir = TempDir::new().unwrap();
    let renderer = RecordingRenderer::new(vec![noise(200, 200, 7), noise(200, 200, 11)]);
    let config = ProcessingConfig {
        merge: true,
        max_output_bytes: 1000,
        ..config_in(dir.path())
    };

    let output = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();

    assert!(output.merged);
    let png = dir.path().join("merged.png");
    let jpg = dir.path().join("merged_compressed.jpg");
    assert!(png.exists());
    assert!(jpg.exists());
    assert_eq!(open_rgb(&png).dimensions(), (200, 400));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::LosslessOverBudget { .. })));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::EncodeBudgetExceeded { quality: 60, .. })));
}

#[test]
fn merge_too_tall_for_webp_falls_back_to_split_pages() {
    let dir = TempDir::new().unwrap();
    let pages = (0..4).map(|i| noise(16, 5000, 3 + i)).collect();
    let renderer = RecordingRenderer::new(pages);
    let config = ProcessingConfig {
        merge: true,
        formats: vec![OutputFormat::WebP],
        ..config_in(dir.path())
    };

    let output = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();

    assert!(!output.merged);
    assert!(output.warnings.iter().any(|w| matches!(
        w,
        Warning::MergeUnencodable {
            height: 20_000,
            format: "webp",
            ..
        }
    )));
    assert!(!dir.path().join("merged.webp").exists());
    for n in 1..=4 {
        assert!(dir.path().join(format!("page_{n:02}.webp")).exists());
    }
}

#[test]
fn tall_merge_over_budget_keeps_png_without_jpeg_sibling() {
    let dir = TempDir::new().unwrap();
    let pages = (0..4).map(|i| noise(16, 17_000, 5 + i)).collect();
    let renderer = RecordingRenderer::new(pages);
    let config = ProcessingConfig {
        merge: true,
        max_output_bytes: 1000,
        ..config_in(dir.path())
    };

    let output = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();

    assert!(output.merged);
    assert_eq!(output.paths(), [dir.path().join("merged.png").as_path()]);
    assert!(!dir.path().join("merged_compressed.jpg").exists());
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::LosslessOverBudget { .. })));
    assert!(output.warnings.iter().any(|w| matches!(
        w,
        Warning::LossyFallbackSkipped {
            height: 68_000,
            ..
        }
    )));
}

#[test]
fn merge_over_pixel_limit_falls_back_to_split_pages() {
    let dir = TempDir::new().unwrap();
    let pages = (0..3u8)
        .map(|i| page_with_block(200, 300, (50, 150), (20, 100), i * 10))
        .collect();
    let renderer = RecordingRenderer::new(pages);
    let config = ProcessingConfig {
        merge: true,
        max_merge_pixels: 10,
        ..config_in(dir.path())
    };

    let output = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();

    assert!(!output.merged);
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::MergeAllocation { .. })));
    assert!(!dir.path().join("merged.png").exists());
    for n in 1..=3 {
        assert!(dir.path().join(format!("page_{n:02}.png")).exists());
    }
}

#[test]
fn unified_crop_gives_equal_widths() {
    let dir = TempDir::new().unwrap();
    let renderer = RecordingRenderer::new(vec![
        page_with_block(1000, 1500, (200, 500), (300, 600), 30),
        page_with_block(1000, 1500, (400, 800), (300, 900), 30),
    ]);
    let config = ProcessingConfig {
        crop_policy: CropPolicy::Unified,
        ..config_in(dir.path())
    };

    Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();

    let first = open_rgb(&dir.path().join("page_01.png"));
    let second = open_rgb(&dir.path().join("page_02.png"));
    assert_eq!(first.dimensions(), (660, 360));
    assert_eq!(second.dimensions(), (660, 660));
}

#[test]
fn merged_pages_keep_document_order() {
    let dir = TempDir::new().unwrap();
    let shades = [20u8, 90, 160];
    let pages = shades
        .iter()
        .map(|&s| RgbImage::from_pixel(100, 50, Rgb([s, s, s])))
        .collect();
    let renderer = RecordingRenderer::new(pages);
    let config = ProcessingConfig {
        resolution: Some(30),
        batch_size: 2,
        merge: true,
        ..config_in(dir.path())
    };

    let output = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();
    assert_eq!(renderer.calls(), [(1, 2), (3, 3)]);
    assert!(output.merged);

    let merged = open_rgb(&dir.path().join("merged.png"));
    assert_eq!(merged.dimensions(), (100, 150));
    for (i, &s) in shades.iter().enumerate() {
        let y = 10 + 50 * u32::try_from(i).unwrap();
        assert_eq!(*merged.get_pixel(10, y), Rgb([s, s, s]));
    }
}

#[test]
fn garbage_document_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let err = process_document(b"not a document", None, &config_in(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[cfg(feature = "pdf")]
#[test]
fn unreadable_pdf_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let err = process_document(b"%PDF-1.4\nnot really a pdf\n", None, &config_in(dir.path()))
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn failed_page_aborts_run_and_leaves_nothing_behind() {
    let pages = TempDir::new().unwrap();
    page_with_block(200, 300, (50, 150), (20, 100), 30)
        .save(pages.path().join("page1.png"))
        .unwrap();
    std::fs::write(pages.path().join("page2.png"), b"truncated").unwrap();

    let out = TempDir::new().unwrap();
    let config = ProcessingConfig {
        batch_size: 1,
        ..config_in(out.path())
    };
    let renderer = DirectoryRenderer::new(pages.path()).unwrap();
    let err = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn png_and_webp_outputs_decode_to_identical_pixels() {
    let dir = TempDir::new().unwrap();
    let renderer = RasterRenderer::new(page_with_block(600, 800, (100, 500), (100, 400), 60));
    let config = ProcessingConfig {
        formats: vec![OutputFormat::Png, OutputFormat::WebP],
        ..config_in(dir.path())
    };

    let output = Engine::new(config)
        .unwrap()
        .process_document(&renderer)
        .unwrap();
    assert_eq!(output.artifacts.len(), 2);

    let png = open_rgb(&dir.path().join("page_01.png"));
    let webp = open_rgb(&dir.path().join("page_01.webp"));
    assert_eq!(png, webp);
}

#[test]
fn invalid_config_is_rejected_before_rendering() {
    let dir = TempDir::new().unwrap();
    let config = ProcessingConfig {
        formats: Vec::new(),
        ..config_in(dir.path())
    };
    assert!(matches!(
        Engine::new(config),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn directory_of_slides_is_cleaned_in_place() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    for name in ["a.png", "b.png"] {
        RgbImage::from_pixel(1200, 700, Rgb([250, 250, 250]))
            .save(input.path().join(name))
            .unwrap();
    }
    std::fs::write(input.path().join("readme.txt"), "ignored").unwrap();

    let engine = Engine::new(ProcessingConfig::default()).unwrap();
    let results = engine.process_directory(input.path(), output.path());

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert!(output.path().join("a.png").exists());
    assert!(output.path().join("b.png").exists());
}
