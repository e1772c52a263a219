//! Error types for the pdf2note library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2NoteError`]: **Fatal**: the run cannot proceed (bad input file,
//!   malformed page selection, an asset that could not be written). Returned
//!   as `Err(Pdf2NoteError)` from [`crate::convert::convert`].
//!
//! * [`PageWarning`]: **Non-fatal**: an optional collaborator misbehaved on
//!   one page (OCR timed out, a table engine failed). The page is still
//!   rendered with whatever native content it had and the warning is appended
//!   to the manifest's `warnings` list.
//!
//! Missing optional backends are checked once into
//! [`crate::capabilities::Capabilities`] and simply not used; a page that
//! needed OCR without a backend gets a [`PageWarning::OcrUnavailable`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2note library.
#[derive(Debug, Error)]
pub enum Pdf2NoteError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The `--pages` value could not be parsed.
    #[error("Invalid page selection '{spec}': {reason}")]
    InvalidPageSpec { spec: String, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The PDF engine failed while reading one page.
    #[error("Extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: u32, detail: String },

    /// The PDF engine failed to rasterise one page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: u32, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write one of the output files.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing output file could not be read back.
    #[error("Failed to read '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `manifest.json` exists but is not a manifest.
    #[error("Manifest '{path}' is unreadable: {detail}\nRe-run with --force to start over.")]
    CorruptManifest { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
pdf2note needs the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or containing directory).\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem on a single page.
///
/// Serialised verbatim (as its display string) into the manifest's
/// `warnings` list so a later run or a human can see which pages degraded.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageWarning {
    /// The OCR worker did not answer in time.
    #[error("Page {page}: OCR timed out after {secs}s")]
    OcrTimeout { page: u32, secs: u64 },

    /// The OCR backend returned an error or the worker crashed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: u32, detail: String },

    /// OCR was needed but no backend is available.
    #[error("Page {page}: little or no native text and no OCR backend available")]
    OcrUnavailable { page: u32 },

    /// A table engine failed; the page continues without its tables.
    #[error("Page {page}: table engine '{engine}' failed: {detail}")]
    TableEngineFailed {
        page: u32,
        engine: String,
        detail: String,
    },

    /// An embedded image could not be decoded by the PDF engine.
    #[error("Page {page}: image {index} could not be decoded: {detail}")]
    ImageDecodeFailed { page: u32, index: usize, detail: String },
}
