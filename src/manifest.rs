//! The resumable per-page manifest (`manifest.json`).
//!
//! A page key present in the manifest is never processed again unless the
//! run is forced. The manifest is rewritten after every page through a temp
//! file in the same directory followed by a rename, so an interrupted run
//! leaves either the previous or the next version on disk, never half of one.

use crate::error::Pdf2NoteError;
use crate::pipeline::markdown::{ImageRef, TableRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// File name inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What was produced for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub images: Vec<ImageRef>,
    pub tables: Vec<TableRef>,
    /// Whether OCR text was used for this page.
    pub ocr: bool,
}

/// Progress record for one output directory.
///
/// Page keys serialise as JSON strings (`"1"`) and are kept in numeric order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub pages: BTreeMap<u32, PageEntry>,
    /// Human-readable per-page warnings, in the order they happened.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Pages whose content came from OCR, in processing order.
    #[serde(default)]
    pub ocr_pages: Vec<u32>,
    /// Wall-clock seconds of the last run that did any work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl Manifest {
    /// Read the manifest at `path`; `Ok(None)` when there is none yet.
    pub fn load(path: &Path) -> Result<Option<Self>, Pdf2NoteError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Pdf2NoteError::OutputReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Pdf2NoteError::CorruptManifest {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> Result<(), Pdf2NoteError> {
        let write_err = |source: std::io::Error| Pdf2NoteError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Pdf2NoteError::Internal(format!("manifest serialisation: {e}")))?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        debug!(pages = self.pages.len(), "Manifest saved");
        Ok(())
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains_key(&page)
    }

    /// Record a finished page.
    pub fn record(&mut self, page: u32, entry: PageEntry) {
        if entry.ocr {
            self.ocr_pages.push(page);
        }
        self.pages.insert(page, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ocr: bool) -> PageEntry {
        PageEntry {
            images: vec![ImageRef {
                path: "images/p0001_img01.png".into(),
                caption: None,
            }],
            tables: Vec::new(),
            ocr,
        }
    }

    #[test]
    fn missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Manifest::load(&dir.path().join(MANIFEST_FILE)).unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let mut m = Manifest::default();
        m.record(10, entry(false));
        m.record(2, entry(true));
        m.warnings.push("Page 2: OCR timed out after 120s".into());
        m.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap().unwrap();
        assert_eq!(loaded, m);
        assert!(loaded.contains(2) && loaded.contains(10) && !loaded.contains(3));
        assert_eq!(loaded.ocr_pages, vec![2]);
    }

    #[test]
    fn page_keys_are_strings_in_numeric_order() {
        let mut m = Manifest::default();
        m.record(10, entry(false));
        m.record(2, entry(false));
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.starts_with(r#"{"pages":{"2":"#), "got: {json}");
        assert!(json.contains(r#""caption":null"#));
        assert!(!json.contains("duration_seconds"));
    }

    #[test]
    fn accepts_manifest_written_by_hand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, r#"{"pages": {"3": {"images": [], "tables": [], "ocr": false}}}"#).unwrap();
        let m = Manifest::load(&path).unwrap().unwrap();
        assert!(m.contains(3));
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn corrupt_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Manifest::load(&path).unwrap_err(),
            Pdf2NoteError::CorruptManifest { .. }
        ));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        Manifest::default().save(&path).unwrap();
        Manifest::default().save(&path).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(MANIFEST_FILE)]);
    }
}
