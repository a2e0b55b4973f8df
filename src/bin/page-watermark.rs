use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use page_watermark_removal::render::is_pdf;
use page_watermark_removal::{
    default_output_path, load_logo, merge_images, open_document, CropPolicy, DirectoryRenderer,
    DocumentOutput, EncodeBudget, Engine, LogoAnchor, OutputFormat, ProcessResult,
    ProcessingConfig, RasterRenderer, Warning,
};

#[derive(Parser)]
#[command(
    name = "page-watermark",
    about = "Remove corner watermarks from slide images and rendered document pages",
    version,
    after_help = "Simple usage: page-watermark image <slide.png>  (writes slide_clean.png)\n\n\
                  Documents are read as a PDF (with the `pdf` feature), a directory of rendered\n\
                  page images (one file per page), or a single page image."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Clean exported slide images (a file or a directory of files)
    Image {
        /// Input image file or directory
        input: PathBuf,

        /// Output file or directory (default: {name}_clean.{ext})
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Logo stamped where the watermark was
        #[arg(long)]
        logo: Option<PathBuf>,
    },
    /// Clean every page of a rendered document
    Document(DocumentArgs),
    /// Stack images vertically into one file
    Merge {
        /// Images to stack, top to bottom
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,

        /// Byte budget for PNG output
        #[arg(long)]
        max_bytes: Option<u64>,
    },
}

#[derive(Args)]
struct DocumentArgs {
    /// Directory of page images, a PDF, or a single page image
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Logo stamped where the watermark was
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Where the logo goes on each page
    #[arg(long, value_enum, default_value_t = Anchor::Corner)]
    anchor: Anchor,

    /// Merge all pages into a single image
    #[arg(long)]
    merge: bool,

    /// Output width in pixels
    #[arg(short, long, default_value_t = 1200)]
    width: u32,

    /// Render resolution (default: planned from --width)
    #[arg(long)]
    resolution: Option<u32>,

    /// Resolution the input page images were rendered at
    #[arg(long, default_value_t = 300)]
    source_resolution: u32,

    /// Pages per batch
    #[arg(long, default_value_t = 5)]
    batch_size: usize,

    /// Output format; repeat for several (png, jpg, webp)
    #[arg(short, long = "format", default_value = "webp")]
    formats: Vec<OutputFormat>,

    /// How pages are cropped to their content
    #[arg(long, value_enum, default_value_t = Crop::PerPage)]
    crop: Crop,

    /// Byte budget for PNG output
    #[arg(long)]
    max_bytes: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Anchor {
    /// Fixed inset from the bottom-right corner
    Corner,
    /// Centered on the removed watermark
    Center,
}

impl From<Anchor> for LogoAnchor {
    fn from(anchor: Anchor) -> Self {
        match anchor {
            Anchor::Corner => LogoAnchor::BottomRight,
            Anchor::Center => LogoAnchor::WatermarkCenter,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Crop {
    /// Crop each page to its own content
    PerPage,
    /// Share left/right margins across all pages
    Unified,
}

impl From<Crop> for CropPolicy {
    fn from(crop: Crop) -> Self {
        match crop {
            Crop::PerPage => CropPolicy::PerPage,
            Crop::Unified => CropPolicy::Unified,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let ok = match cli.command {
        Command::Image {
            input,
            output,
            logo,
        } => run_image(&input, output, logo.as_deref(), cli.quiet),
        Command::Document(args) => run_document(args, cli.quiet),
        Command::Merge {
            inputs,
            output,
            max_bytes,
        } => run_merge(&inputs, &output, max_bytes),
    };

    if !ok {
        process::exit(1);
    }
}

fn load_logo_or_exit(path: Option<&Path>) -> Option<image::RgbaImage> {
    let path = path?;
    match load_logo(path) {
        Ok(logo) => Some(logo),
        Err(e) => {
            eprintln!("Fatal: {e}");
            process::exit(1);
        }
    }
}

fn run_image(input: &Path, output: Option<PathBuf>, logo: Option<&Path>, quiet: bool) -> bool {
    if !input.exists() {
        eprintln!("Error: Input path does not exist: {}", input.display());
        return false;
    }

    let mut engine = match Engine::new(ProcessingConfig::default()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Fatal: Failed to initialize engine: {e}");
            return false;
        }
    };
    if let Some(logo) = load_logo_or_exit(logo) {
        engine = engine.with_logo(logo);
    }

    let results = if input.is_dir() {
        let Some(output_dir) = output else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: page-watermark image <input_dir> -o <output_dir>");
            return false;
        };
        engine.process_directory(input, &output_dir)
    } else {
        let output = output.unwrap_or_else(|| default_output_path(input));
        vec![engine.process_file(input, &output)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;
    for r in &results {
        print_result(r, quiet);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    fail_count == 0
}

fn run_document(args: DocumentArgs, quiet: bool) -> bool {
    let mut config = ProcessingConfig {
        target_width: args.width,
        resolution: args.resolution,
        batch_size: args.batch_size,
        merge: args.merge,
        formats: args.formats,
        logo_anchor: args.anchor.into(),
        crop_policy: args.crop.into(),
        output_dir: args.output,
        ..ProcessingConfig::default()
    };
    if let Some(max_bytes) = args.max_bytes {
        config.max_output_bytes = max_bytes;
    }

    let mut engine = match Engine::new(config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            return false;
        }
    };
    if let Some(logo) = load_logo_or_exit(args.logo.as_deref()) {
        engine = engine.with_logo(logo);
    }

    let result = if args.input.is_dir() {
        DirectoryRenderer::new(&args.input).and_then(|r| {
            engine.process_document(&r.with_source_resolution(args.source_resolution))
        })
    } else {
        std::fs::read(&args.input)
            .map_err(page_watermark_removal::Error::from)
            .and_then(|bytes| {
                if is_pdf(&bytes) {
                    open_document(&bytes).and_then(|r| engine.process_document(r.as_ref()))
                } else {
                    RasterRenderer::from_bytes(&bytes).and_then(|r| {
                        engine.process_document(&r.with_source_resolution(args.source_resolution))
                    })
                }
            })
    };

    match result {
        Ok(output) => {
            print_document(&output, quiet);
            true
        }
        Err(e) => {
            error!("{e}");
            eprintln!("[FAIL] {}: {e}", args.input.display());
            false
        }
    }
}

fn run_merge(inputs: &[PathBuf], output: &Path, max_bytes: Option<u64>) -> bool {
    let defaults = ProcessingConfig::default();
    let mut budget = EncodeBudget::from(&defaults);
    if let Some(max_bytes) = max_bytes {
        budget.max_bytes = max_bytes;
    }

    match merge_images(inputs, output, &budget, defaults.max_merge_pixels) {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                eprintln!("[WARN] {warning}");
            }
            for artifact in &outcome.artifacts {
                info!("{} ({} bytes)", artifact.path.display(), artifact.bytes);
            }
            true
        }
        Err(e) => {
            eprintln!("[FAIL] {}: {e}", output.display());
            false
        }
    }
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("[WARN] {warning}");
    }
}

fn print_document(output: &DocumentOutput, quiet: bool) {
    print_warnings(&output.warnings);
    if quiet {
        return;
    }
    let mode = if output.merged { "merged" } else { "split" };
    eprintln!("[OK] {} pages ({mode})", output.page_count);
    for artifact in &output.artifacts {
        eprintln!("  -> {} ({} bytes)", artifact.path.display(), artifact.bytes);
    }
}

fn print_result(result: &ProcessResult, quiet: bool) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        print_warnings(&result.warnings);
        if !quiet {
            eprintln!("[OK] {filename}: {}", result.message);
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}
