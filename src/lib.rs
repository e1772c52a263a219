//! # pdf2note
//!
//! Convert PDF documents into Obsidian-flavoured Markdown notes.
//!
//! ## Why this crate?
//!
//! Technical PDFs mix prose, code listings, call-out boxes, figures and
//! tables. Plain text extraction flattens all of that. This crate keeps the
//! glyph geometry from the PDF, rebuilds lines in reading order, and
//! classifies each line (heading, code, callout, plain) before writing
//! Markdown. Figures are exported as PNGs with their nearest caption, tables
//! go to CSV plus an inline pipe table, and pages without a text layer are
//! sent through OCR.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Detect    which optional backends (OCR, table engines) are usable
//!  ├─ 2. Extract   glyphs, paths, images per page via pdfium (spawn_blocking)
//!  ├─ 3. Layout    glyphs → lines → blocks, reading order
//!  ├─ 4. OCR       only when the text layer is too thin, bounded by a timeout
//!  ├─ 5. Tables    lattice (ruled) then stream (aligned) → CSV
//!  ├─ 6. Render    classified lines → Markdown appended to page.md
//!  └─ 7. Persist   manifest.json after every page; resume skips done pages
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2note::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().toc(true).build()?;
//!     let output = convert("guide.pdf", "notes/guide", &config).await?;
//!     eprintln!(
//!         "{} pages converted, {} skipped, {} via OCR",
//!         output.stats.processed_pages,
//!         output.stats.skipped_pages,
//!         output.stats.ocr_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! out_dir/
//!   page.md          the note (frontmatter, TOC marker, one block per page)
//!   manifest.json    per-page record; drives resume
//!   metadata.json    PDF Info dictionary
//!   images/          p0001_img01.png …
//!   tables/          p0001_table01.csv …
//!   logs/            page_0001.json line dumps, extraction.log
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2note` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2note = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capabilities;
pub mod config;
pub mod convert;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capabilities::Capabilities;
pub use config::{ConversionConfig, ConversionConfigBuilder, Mode, PageSelection, PageSpan};
pub use convert::{convert, convert_source, convert_sync, inspect, OutputLayout};
pub use error::{PageWarning, Pdf2NoteError};
pub use manifest::{Manifest, PageEntry};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata};
pub use pipeline::ocr::{OcrBackend, OcrError, TesseractBackend};
pub use pipeline::source::{DocumentSource, PageContent, PageImage, PdfiumSource};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use validate::{validate_output, ValidationReport};
