//! Conversion entry points: the page pipeline and its manifest.
//!
//! ```text
//! INIT ─▶ for each selected page not in the manifest:
//!           EXTRACT ─▶ dump ─▶ OCR_DECIDE ─▶ OCR_RUN ─▶ TABLES ─▶ RENDER ─▶ PERSIST
//!      ─▶ DONE (optional TOC, final manifest stamp)
//! ```
//!
//! Pages are processed one at a time. After every page the note has been
//! appended to and the manifest rewritten, so killing the process between
//! pages loses at most the page in flight; the next run picks up where this
//! one stopped.

use crate::capabilities::Capabilities;
use crate::config::ConversionConfig;
use crate::error::{PageWarning, Pdf2NoteError};
use crate::manifest::{Manifest, PageEntry, MANIFEST_FILE};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::caption::select_caption;
use crate::pipeline::classify::body_size;
use crate::pipeline::encode::save_png;
use crate::pipeline::layout::{group_blocks, group_lines, text_lines, TextLine};
use crate::pipeline::markdown::{render_page, ImageRef};
use crate::pipeline::ocr::{should_ocr, synthetic_line, OcrEngine};
use crate::pipeline::source::{run_blocking, DocumentSource, PdfiumSource};
use crate::pipeline::tables::extract_tables;
use crate::pipeline::toc::{insert_toc, TOC_MARKER};
use crate::pipeline::input::resolve_input;
use crate::validate::NOTE_FILE;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where everything lives inside `--out_dir`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.root.join("tables")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn note(&self) -> PathBuf {
        self.root.join(NOTE_FILE)
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    /// Per-page line dump, `logs/page_0001.json`.
    pub fn page_dump(&self, page: u32) -> PathBuf {
        self.logs_dir().join(format!("page_{page:04}.json"))
    }

    /// Run log written by the CLI, `logs/extraction.log`.
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("extraction.log")
    }

    /// Create the root and its `images/`, `tables/` and `logs/` children.
    pub fn create(&self) -> Result<(), Pdf2NoteError> {
        for dir in [self.images_dir(), self.tables_dir(), self.logs_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| Pdf2NoteError::OutputWriteFailed { path: dir, source: e })?;
        }
        Ok(())
    }
}

/// Everything a page stage needs, assembled once in INIT.
#[derive(Debug)]
pub struct RunContext {
    pub layout: OutputLayout,
    pub config: ConversionConfig,
    pub capabilities: Capabilities,
    ocr: OcrEngine,
}

impl RunContext {
    pub fn new(layout: OutputLayout, config: ConversionConfig, capabilities: Capabilities) -> Self {
        let ocr = OcrEngine::new(
            capabilities.ocr_engine.clone(),
            config.ocr_language.clone(),
            config.ocr_dpi(),
            Duration::from_secs(config.ocr_timeout_secs),
        );
        Self {
            layout,
            config,
            capabilities,
            ocr,
        }
    }
}

/// What one page produced.
struct PageOutcome {
    markdown: Vec<String>,
    entry: PageEntry,
    warnings: Vec<PageWarning>,
}

/// Convert a PDF file into a note under `out_dir`.
///
/// This is the primary entry point for the library. Re-running with the same
/// `out_dir` resumes: pages already in `manifest.json` are skipped.
///
/// # Errors
/// Returns `Err(Pdf2NoteError)` only for fatal errors: an unreadable or
/// invalid input, a malformed manifest, or an output file that could not be
/// written. OCR and table problems are recorded as manifest warnings.
pub async fn convert(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2NoteError> {
    let pdf_path = resolve_input(input)?;
    info!("Starting conversion: {}", pdf_path.display());

    let password = config.password.clone();
    let source = tokio::task::spawn_blocking(move || PdfiumSource::open(pdf_path, password))
        .await
        .map_err(|e| Pdf2NoteError::Internal(format!("PDF open task panicked: {e}")))??;

    convert_source(Arc::new(source), out_dir, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2NoteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2NoteError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(input, out_dir, config))
}

/// Extract PDF metadata without converting content.
pub async fn inspect(
    input: impl AsRef<Path>,
    password: Option<String>,
) -> Result<DocumentMetadata, Pdf2NoteError> {
    let pdf_path = resolve_input(input)?;
    tokio::task::spawn_blocking(move || PdfiumSource::open(pdf_path, password)?.metadata())
    .await
    .map_err(|e| Pdf2NoteError::Internal(format!("Metadata task panicked: {e}")))?
}

/// Run the page pipeline against any [`DocumentSource`].
pub async fn convert_source(
    source: Arc<dyn DocumentSource>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2NoteError> {
    let started = Instant::now();

    // ── INIT ─────────────────────────────────────────────────────────────
    let layout = OutputLayout::new(out_dir.as_ref());
    layout.create()?;

    let detect_config = config.clone();
    let capabilities = tokio::task::spawn_blocking(move || Capabilities::detect(&detect_config))
        .await
        .map_err(|e| Pdf2NoteError::Internal(format!("Capability check panicked: {e}")))?;
    let ctx = RunContext::new(layout, config.clone(), capabilities);

    let metadata = run_blocking(&source, |doc| doc.metadata()).await?;
    info!(
        pages = metadata.page_count,
        title = metadata.note_title(),
        "Document opened"
    );
    write_json(&ctx.layout.metadata(), &metadata)?;

    if ctx.config.force {
        for path in [ctx.layout.manifest(), ctx.layout.note()] {
            remove_if_exists(&path)?;
        }
        info!("--force: discarded previous manifest and note");
    }

    let manifest_path = ctx.layout.manifest();
    let loaded = Manifest::load(&manifest_path)?;
    let manifest_existed = loaded.is_some();
    let mut manifest = loaded.unwrap_or_default();

    let note_path = ctx.layout.note();
    write_frontmatter(&note_path, &metadata)?;

    let selected = ctx.config.pages.to_pages(metadata.page_count);
    if selected.is_empty() {
        warn!(
            total = metadata.page_count,
            "Page selection matches no pages of this document; nothing to do"
        );
    }
    debug!(?selected, "Selected pages");

    let total = selected.len();
    let callback = ctx.config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_conversion_start(total);
    }

    let mut stats = ConversionStats {
        total_pages: metadata.page_count,
        selected_pages: total,
        ..Default::default()
    };

    // ── Pages ────────────────────────────────────────────────────────────
    for &page in &selected {
        if manifest.contains(page) {
            info!(page, "Skipping page (already processed)");
            stats.skipped_pages += 1;
            if let Some(ref cb) = callback {
                cb.on_page_skipped(page, total);
            }
            continue;
        }

        info!(page, "Processing page");
        if let Some(ref cb) = callback {
            cb.on_page_start(page, total);
        }

        let outcome = process_page(&ctx, &source, page).await?;

        let mut chunk = outcome.markdown.join("\n");
        chunk.push('\n');
        append(&note_path, &chunk)?;

        stats.processed_pages += 1;
        stats.images += outcome.entry.images.len();
        stats.tables += outcome.entry.tables.len();
        stats.warnings += outcome.warnings.len();
        if outcome.entry.ocr {
            stats.ocr_pages += 1;
        }

        manifest
            .warnings
            .extend(outcome.warnings.iter().map(ToString::to_string));
        manifest.record(page, outcome.entry);
        manifest.save(&manifest_path)?;

        if let Some(ref cb) = callback {
            cb.on_page_complete(page, total, chunk.len());
        }
    }

    // ── DONE ─────────────────────────────────────────────────────────────
    if ctx.config.toc && note_path.exists() {
        let current = read_note(&note_path)?;
        let updated = insert_toc(&current);
        if updated != current {
            write_file(&note_path, &updated)?;
            debug!("Table of contents refreshed");
        } else if !current.lines().any(|l| l.trim() == TOC_MARKER) {
            warn!("--toc requested but {} has no {} marker", NOTE_FILE, TOC_MARKER);
        }
    }

    stats.total_duration_ms = started.elapsed().as_millis() as u64;
    if stats.processed_pages > 0 || !manifest_existed {
        manifest.duration_seconds = Some(started.elapsed().as_secs_f64());
        manifest.save(&manifest_path)?;
    }

    if let Some(ref cb) = callback {
        cb.on_conversion_complete(total, stats.processed_pages);
    }
    info!(
        processed = stats.processed_pages,
        skipped = stats.skipped_pages,
        ocr = stats.ocr_pages,
        ms = stats.total_duration_ms,
        "Conversion complete"
    );

    Ok(ConversionOutput {
        note_path,
        metadata,
        stats,
    })
}

/// EXTRACT → dump → OCR → tables → RENDER for one page.
async fn process_page(
    ctx: &RunContext,
    source: &Arc<dyn DocumentSource>,
    page: u32,
) -> Result<PageOutcome, Pdf2NoteError> {
    let content = run_blocking(source, move |doc| doc.page(page)).await?;
    let char_lines = group_lines(&content.chars);
    let blocks = group_blocks(&char_lines);
    let mut lines = text_lines(&char_lines);
    let mut warnings = Vec::new();

    // ── OCR ──────────────────────────────────────────────────────────────
    let body = body_size(&lines);
    let mut ocr_used = false;
    if should_ocr(&lines, body) {
        debug!(page, body_size = body, "Native text insufficient; trying OCR");
        let (result, warning) = ctx.ocr.run(source, page).await;
        warnings.extend(warning);
        ocr_used = result.used_ocr;
        if result.used_ocr && !result.text.is_empty() {
            lines.push(synthetic_line(&result.text, body, content.height));
        }
    }

    write_page_dump(&ctx.layout.page_dump(page), page, &lines)?;

    // ── Images ───────────────────────────────────────────────────────────
    let mut images = Vec::new();
    for (i, placed) in content.images.iter().enumerate() {
        let index = i + 1;
        match &placed.image {
            Ok(image) => {
                let file_name = format!("p{page:04}_img{index:02}.png");
                save_png(image, &ctx.layout.images_dir().join(&file_name))?;
                let caption = placed
                    .rect
                    .as_ref()
                    .and_then(|rect| select_caption(&blocks, rect))
                    .map(str::to_string);
                images.push(ImageRef {
                    path: format!("images/{file_name}"),
                    caption,
                });
            }
            Err(detail) => {
                warn!(page, index, "Embedded image could not be decoded: {detail}");
                warnings.push(PageWarning::ImageDecodeFailed {
                    page,
                    index,
                    detail: detail.clone(),
                });
            }
        }
    }

    // ── Tables ───────────────────────────────────────────────────────────
    let page_tables = extract_tables(
        &content,
        &char_lines,
        ctx.config.mode,
        &ctx.capabilities,
        &ctx.layout.tables_dir(),
    )?;
    warnings.extend(page_tables.warnings);

    // ── Render ───────────────────────────────────────────────────────────
    let markdown = render_page(
        &lines,
        page,
        &images,
        &page_tables.tables,
        ocr_used,
        &ctx.config.code_language,
    );

    Ok(PageOutcome {
        markdown,
        entry: PageEntry {
            images,
            tables: page_tables.tables,
            ocr: ocr_used,
        },
        warnings,
    })
}

// ── File helpers ─────────────────────────────────────────────────────────

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> Pdf2NoteError + '_ {
    move |source| Pdf2NoteError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), Pdf2NoteError> {
    std::fs::write(path, contents).map_err(write_err(path))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Pdf2NoteError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Pdf2NoteError::Internal(format!("JSON serialisation: {e}")))?;
    write_file(path, &json)
}

fn read_note(path: &Path) -> Result<String, Pdf2NoteError> {
    std::fs::read_to_string(path).map_err(|e| Pdf2NoteError::OutputReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn remove_if_exists(path: &Path) -> Result<(), Pdf2NoteError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(write_err(path)(e)),
        _ => Ok(()),
    }
}

fn append(path: &Path, text: &str) -> Result<(), Pdf2NoteError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err(path))?;
    file.write_all(text.as_bytes()).map_err(write_err(path))
}

/// Start a new note with YAML frontmatter and the TOC marker.
fn write_frontmatter(note: &Path, metadata: &DocumentMetadata) -> Result<(), Pdf2NoteError> {
    if note.exists() {
        return Ok(());
    }
    let frontmatter = format!(
        "---\ntitle: {}\n---\n\n{TOC_MARKER}\n",
        metadata.note_title()
    );
    write_file(note, &frontmatter)
}

fn write_page_dump(path: &Path, page: u32, lines: &[TextLine]) -> Result<(), Pdf2NoteError> {
    write_json(path, &serde_json::json!({ "page": page, "lines": lines }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("/out");
        assert_eq!(layout.note(), PathBuf::from("/out/page.md"));
        assert_eq!(layout.manifest(), PathBuf::from("/out/manifest.json"));
        assert_eq!(layout.page_dump(7), PathBuf::from("/out/logs/page_0007.json"));
        assert_eq!(layout.log_file(), PathBuf::from("/out/logs/extraction.log"));
    }

    #[test]
    fn layout_create_makes_children() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("nested/out"));
        layout.create().unwrap();
        assert!(layout.images_dir().is_dir());
        assert!(layout.tables_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
    }

    #[test]
    fn frontmatter_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join(NOTE_FILE);
        let meta = DocumentMetadata {
            title: Some("Guide".into()),
            ..Default::default()
        };
        write_frontmatter(&note, &meta).unwrap();
        assert_eq!(
            std::fs::read_to_string(&note).unwrap(),
            "---\ntitle: Guide\n---\n\n<!-- toc -->\n"
        );
        append(&note, "more\n").unwrap();
        write_frontmatter(&note, &DocumentMetadata::default()).unwrap();
        assert!(std::fs::read_to_string(&note).unwrap().ends_with("more\n"));
    }

    #[test]
    fn remove_if_exists_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        remove_if_exists(&dir.path().join("absent")).unwrap();
    }
}
