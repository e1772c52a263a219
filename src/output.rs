//! Values returned to callers once a run finishes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Document-level metadata, captured once when the PDF is opened.
///
/// Serialised as `metadata.json`; the date keys keep the PDF Info dictionary
/// spelling (`creationDate`, `modDate`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    #[serde(rename = "creationDate")]
    pub creation_date: Option<String>,
    #[serde(rename = "modDate")]
    pub modification_date: Option<String>,
    pub page_count: u32,
    #[serde(default)]
    pub pdf_version: String,
}

impl DocumentMetadata {
    /// Title used in the note's frontmatter.
    pub fn note_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("PDF Notes")
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: u32,
    /// Pages selected by `--pages`.
    pub selected_pages: usize,
    /// Pages extracted and rendered during this run.
    pub processed_pages: usize,
    /// Selected pages skipped because the manifest already had them.
    pub skipped_pages: usize,
    /// Pages of this run that went through OCR.
    pub ocr_pages: usize,
    /// Images exported during this run.
    pub images: usize,
    /// Tables exported during this run.
    pub tables: usize,
    /// Warnings recorded during this run.
    pub warnings: usize,
    /// Wall-clock time of the run.
    pub total_duration_ms: u64,
}

/// Result of [`crate::convert::convert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Path of the assembled note (`<out_dir>/page.md`).
    pub note_path: PathBuf,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}
