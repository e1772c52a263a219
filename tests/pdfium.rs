//! Tests against real PDF files through the pdfium engine.
//!
//! Tests that open a PDF need the pdfium shared library and are gated behind
//! the `PDF2NOTE_PDFIUM_TESTS` environment variable. Input-validation tests
//! fail before pdfium is touched and always run.
//!
//! Run with:
//!   PDF2NOTE_PDFIUM_TESTS=1 PDFIUM_LIB_PATH=. cargo test --test pdfium -- --nocapture

use pdf2note::{
    convert, inspect, validate_output, ConversionConfig, DocumentSource, Mode, Pdf2NoteError,
    PdfiumSource,
};
use std::sync::Arc;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless PDF2NOTE_PDFIUM_TESTS is set and the PDF at `path` exists.
macro_rules! skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("PDF2NOTE_PDFIUM_TESTS").is_err() {
            println!("SKIP: set PDF2NOTE_PDFIUM_TESTS=1 to run pdfium tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

// ── Input validation (no pdfium needed) ──────────────────────────────────────

#[tokio::test]
async fn test_inspect_nonexistent() {
    let err = inspect("/no/such/file.pdf", None).await.unwrap_err();
    assert!(matches!(err, Pdf2NoteError::FileNotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn test_convert_rejects_non_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("notes.pdf");
    std::fs::write(&fake, "# just markdown\n").unwrap();

    let err = convert(&fake, dir.path().join("out"), &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2NoteError::NotAPdf { .. }), "got: {err}");
    assert!(!dir.path().join("out").exists(), "nothing is written for bad input");
}

// ── Real documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_sample() {
    let pdf = skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let meta = inspect(&pdf, None).await.unwrap();
    assert!(meta.page_count > 0);
    assert!(!meta.pdf_version.is_empty());
}

#[tokio::test]
async fn test_convert_sample_first_pages() {
    let pdf = skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .mode(Mode::Accurate)
        .pages("1-2".parse().unwrap())
        .toc(true)
        .build()
        .unwrap();

    let output = convert(&pdf, dir.path(), &config).await.unwrap();
    assert!(output.stats.processed_pages >= 1);

    let note = std::fs::read_to_string(&output.note_path).unwrap();
    assert!(note.starts_with("---\ntitle: "), "{note}");
    assert!(note.contains("<!-- page: 1 -->"));

    let report = validate_output(dir.path()).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems);

    // Second run resumes and does nothing.
    let again = convert(&pdf, dir.path(), &config).await.unwrap();
    assert_eq!(again.stats.processed_pages, 0);
    assert_eq!(std::fs::read_to_string(&output.note_path).unwrap(), note);
}

#[test]
fn test_source_answers_callers_on_many_threads() {
    let pdf = skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let source = Arc::new(PdfiumSource::open(&pdf, None).unwrap());
    let pages = source.metadata().unwrap().page_count.min(4);

    let handles: Vec<_> = (1..=pages)
        .map(|number| {
            let source = Arc::clone(&source);
            std::thread::spawn(move || source.page(number).unwrap())
        })
        .collect();
    for (number, handle) in (1..=pages).zip(handles) {
        let page = handle.join().unwrap();
        assert_eq!(page.number, number);
        assert!(page.width > 0.0 && page.height > 0.0);
    }

    let raster = source.rasterise(1, 72).unwrap();
    assert!(raster.width() > 0);
    assert!(source.page(pages + 1).is_err());
}
