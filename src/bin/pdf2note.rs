//! CLI binary for pdf2note.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2note::convert::OutputLayout;
use pdf2note::{
    convert, inspect, validate_output, ConversionConfig, ConversionProgressCallback, Mode,
    PageSelection, ProgressCallback,
};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start of the page in flight.
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} selected pages…"))
        ));
    }

    fn on_page_start(&self, page_num: u32, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: u32, total: usize, markdown_len: usize) {
        let elapsed = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{markdown_len:>5} bytes")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: u32, total: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            dim("↷"),
            page_num,
            total,
            dim("already in manifest"),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, processed_count: usize) {
        self.bar.finish_and_clear();
        let skipped = total_pages.saturating_sub(processed_count);
        eprintln!(
            "{} {} pages converted{}",
            green("✔"),
            bold(&processed_count.to_string()),
            if skipped > 0 {
                dim(&format!("  ({skipped} already done)"))
            } else {
                String::new()
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a whole book into an Obsidian note folder
  pdf2note convert --input book.pdf --out_dir notes/book

  # Accurate mode (300 DPI OCR, ruled-table detection), with a TOC
  pdf2note convert --input book.pdf --out_dir notes/book --mode accurate --toc

  # A few pages only; rerunning resumes where the last run stopped
  pdf2note convert --input book.pdf --out_dir notes/book --pages 1-3,7

  # Start over
  pdf2note convert --input book.pdf --out_dir notes/book --force

  # Check an output folder (exit status = number of problems)
  pdf2note validate --out_dir notes/book

  # PDF metadata as JSON
  pdf2note inspect --input book.pdf --json

OUTPUT FOLDER:
  page.md          the note
  manifest.json    pages already converted (drives resume)
  metadata.json    PDF Info dictionary
  images/          p0001_img01.png …
  tables/          p0001_table01.csv …
  logs/            page_0001.json line dumps, extraction.log

ENVIRONMENT VARIABLES:
  PDF2NOTE_*       Every convert flag, e.g. PDF2NOTE_MODE=accurate
  PDFIUM_LIB_PATH  Path to libpdfium (file or containing directory)
  RUST_LOG         Override log filtering (e.g. RUST_LOG=pdf2note=debug)

OCR:
  Pages with (almost) no text layer are rasterised and passed to the
  `tesseract` binary when it is on PATH. Without it those pages keep only
  their native text and a warning is recorded in manifest.json.
"#;

/// Convert PDF documents into Obsidian-flavoured Markdown notes.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2note",
    version,
    about = "Convert PDF documents into Obsidian-flavoured Markdown notes",
    long_about = "Convert PDF documents into Obsidian-flavoured Markdown notes: headings, \
code blocks and callouts from the text layer, exported images with captions, tables as CSV \
plus pipe tables, and OCR for scanned pages. Runs are resumable page by page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2NOTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2NOTE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF into a note folder (resumable).
    Convert(ConvertArgs),
    /// Check a note folder; exit status is the number of problems.
    Validate(ValidateArgs),
    /// Print PDF metadata without converting.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path.
    #[arg(long, env = "PDF2NOTE_INPUT")]
    input: PathBuf,

    /// Output folder (created if missing).
    #[arg(long = "out_dir", visible_alias = "out-dir", env = "PDF2NOTE_OUT_DIR")]
    out_dir: PathBuf,

    /// fast: 220 DPI OCR, stream tables. accurate: 300 DPI OCR, ruled tables first.
    #[arg(long, env = "PDF2NOTE_MODE", value_enum, default_value = "fast")]
    mode: ModeArg,

    /// Page selection: all, 5, 3-15, or 1-3,7.
    #[arg(long, env = "PDF2NOTE_PAGES", default_value = "all")]
    pages: String,

    /// Discard manifest.json and page.md and start over.
    #[arg(long, env = "PDF2NOTE_FORCE")]
    force: bool,

    /// Insert a table of contents after the `<!-- toc -->` marker.
    #[arg(long, env = "PDF2NOTE_TOC")]
    toc: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2NOTE_PASSWORD")]
    password: Option<String>,

    /// Language tag written on code fences.
    #[arg(long = "code-lang", env = "PDF2NOTE_CODE_LANG", default_value = "csharp")]
    code_lang: String,

    /// Language passed to the OCR backend.
    #[arg(long = "ocr-lang", env = "PDF2NOTE_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Per-page OCR timeout in seconds.
    #[arg(long = "ocr-timeout", env = "PDF2NOTE_OCR_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    ocr_timeout: u64,

    /// Skip table detection.
    #[arg(long, env = "PDF2NOTE_NO_TABLES")]
    no_tables: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2NOTE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Output folder written by `convert`.
    #[arg(long = "out_dir", visible_alias = "out-dir", env = "PDF2NOTE_OUT_DIR")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF file path.
    #[arg(long, env = "PDF2NOTE_INPUT")]
    input: PathBuf,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2NOTE_PASSWORD")]
    password: Option<String>,

    /// Print metadata as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Fast,
    Accurate,
}

impl From<ModeArg> for Mode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Fast => Mode::Fast,
            ModeArg::Accurate => Mode::Accurate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Convert(ref args) => run_convert(&cli, args).await,
        Command::Validate(ref args) => {
            init_logging(&cli, false, None)?;
            run_validate(&cli, args)
        }
        Command::Inspect(ref args) => {
            init_logging(&cli, false, None)?;
            run_inspect(args).await
        }
    }
}

// ── Logging setup ────────────────────────────────────────────────────────────

/// Console logs go to stderr; a convert run also appends to
/// `logs/extraction.log` at INFO (DEBUG with `-v`) regardless of the console
/// level. `RUST_LOG` overrides both.
fn init_logging(cli: &Cli, progress_active: bool, log_file: Option<&Path>) -> Result<()> {
    // The progress bar provides the feedback that matters; keep INFO lines
    // from tearing it.
    let console = if cli.verbose {
        "debug"
    } else if cli.quiet || progress_active {
        "error"
    } else {
        "info"
    };
    let file_level = if cli.verbose { "debug" } else { "info" };
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter(file_level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(filter(console)),
        )
        .with(file_layer)
        .init();
    Ok(())
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn run_convert(cli: &Cli, args: &ConvertArgs) -> Result<ExitCode> {
    let show_progress = !cli.quiet && !args.no_progress;
    let layout = OutputLayout::new(&args.out_dir);
    init_logging(cli, show_progress, Some(&layout.log_file()))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(args, progress_cb)?;

    let output = convert(&args.input, &args.out_dir, &config)
        .await
        .context("Conversion failed")?;

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} pages  {} skipped  {} OCR  {} images  {} tables  {}ms  →  {}",
            if stats.warnings == 0 { green("✔") } else { yellow("⚠") },
            stats.processed_pages,
            stats.selected_pages,
            stats.skipped_pages,
            stats.ocr_pages,
            stats.images,
            stats.tables,
            stats.total_duration_ms,
            bold(&output.note_path.display().to_string()),
        );
        if stats.warnings > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} warnings recorded in {}",
                    stats.warnings,
                    layout.manifest().display()
                ))
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_validate(cli: &Cli, args: &ValidateArgs) -> Result<ExitCode> {
    let report = validate_output(&args.out_dir)
        .with_context(|| format!("Failed to validate {}", args.out_dir.display()))?;

    if report.is_ok() {
        if !cli.quiet {
            eprintln!("{} Validation passed", green("✔"));
        }
        return Ok(ExitCode::SUCCESS);
    }

    for problem in &report.problems {
        println!("{problem}");
    }
    if !cli.quiet {
        eprintln!("{} {} problems found", yellow("⚠"), report.count());
    }
    // Exit statuses are a single byte.
    Ok(ExitCode::from(report.count().min(255) as u8))
}

async fn run_inspect(args: &InspectArgs) -> Result<ExitCode> {
    let meta = inspect(&args.input, args.password.clone())
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
    } else {
        println!("File:         {}", args.input.display());
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = meta.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
        if let Some(ref d) = meta.creation_date {
            println!("Created:      {}", d);
        }
        if let Some(ref d) = meta.modification_date {
            println!("Modified:     {}", d);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `ConversionConfig`.
fn build_config(args: &ConvertArgs, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages: PageSelection = args
        .pages
        .parse()
        .with_context(|| format!("Invalid --pages value '{}'", args.pages))?;

    let mut builder = ConversionConfig::builder()
        .mode(args.mode.into())
        .pages(pages)
        .force(args.force)
        .toc(args.toc)
        .code_language(&args.code_lang)
        .ocr_language(&args.ocr_lang)
        .ocr_timeout_secs(args.ocr_timeout)
        .extract_tables(!args.no_tables);

    if let Some(ref password) = args.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
