//! Read-only sanity check of a conversion's output directory.
//!
//! Findings are collected into a [`ValidationReport`], never returned as
//! errors; the CLI uses the problem count as its exit status.

use crate::error::Pdf2NoteError;
use crate::manifest::MANIFEST_FILE;
use std::path::Path;
use tracing::debug;

/// Name of the assembled note inside the output directory.
pub const NOTE_FILE: &str = "page.md";

/// Human-readable problems found in an output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub problems: Vec<String>,
}

impl ValidationReport {
    pub fn count(&self) -> usize {
        self.problems.len()
    }

    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check `out_dir` for a note, balanced fences, existing images and a
/// well-formed manifest.
///
/// Only unexpected I/O failures (e.g. an unreadable `page.md`) are errors.
pub fn validate_output(out_dir: &Path) -> Result<ValidationReport, Pdf2NoteError> {
    let mut report = ValidationReport::default();

    let note_path = out_dir.join(NOTE_FILE);
    let note = match std::fs::read_to_string(&note_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            report.problems.push(format!("{NOTE_FILE} missing"));
            return Ok(report);
        }
        Err(e) => {
            return Err(Pdf2NoteError::OutputReadFailed {
                path: note_path,
                source: e,
            })
        }
    };
    let lines: Vec<&str> = note.lines().collect();

    if !fences_balanced(&lines) {
        report.problems.push("Unbalanced code fences detected".to_string());
    }

    for path in image_paths(&lines) {
        if !out_dir.join(path).exists() {
            report.problems.push(format!("Missing image: {path}"));
        }
    }

    let manifest_path = out_dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        let text = std::fs::read_to_string(&manifest_path).map_err(|e| {
            Pdf2NoteError::OutputReadFailed {
                path: manifest_path.clone(),
                source: e,
            }
        })?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) if value.get("pages").is_some() => {}
            Ok(_) => report.problems.push("Manifest missing pages entry".to_string()),
            Err(e) => report.problems.push(format!("Manifest is not valid JSON: {e}")),
        }
    }

    debug!(problems = report.count(), "Validation finished");
    Ok(report)
}

/// An even number of lines whose trimmed text starts with a fence.
fn fences_balanced(lines: &[&str]) -> bool {
    lines
        .iter()
        .filter(|l| l.trim().starts_with("```"))
        .count()
        % 2
        == 0
}

/// Link targets of image lines (`![alt](path)` at line start).
fn image_paths<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines
        .iter()
        .filter(|l| l.starts_with("!["))
        .filter_map(|l| l.split_once("]("))
        .map(|(_, rest)| rest.trim_end_matches(')'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn missing_note_is_single_problem() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MANIFEST_FILE, "{}");
        let report = validate_output(dir.path()).unwrap();
        assert_eq!(report.problems, vec!["page.md missing"]);
    }

    #[test]
    fn clean_output_passes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "images/p0001_img01.png", "png");
        write(
            dir.path(),
            NOTE_FILE,
            "# T\n```csharp\nx();\n```\n\n![Page 1 image](images/p0001_img01.png)\n",
        );
        write(dir.path(), MANIFEST_FILE, r#"{"pages": {}}"#);
        let report = validate_output(dir.path()).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
    }

    #[test]
    fn unbalanced_fence_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), NOTE_FILE, "```csharp\nx();\n");
        let report = validate_output(dir.path()).unwrap();
        assert_eq!(report.problems, vec!["Unbalanced code fences detected"]);
    }

    #[test]
    fn each_missing_image_counts() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            NOTE_FILE,
            "![a](images/p0001_img01.png)\n![b](images/p0001_img02.png)\n  ![indented](nope.png)\n",
        );
        let report = validate_output(dir.path()).unwrap();
        assert_eq!(report.count(), 2);
        assert!(report.problems[0].ends_with("images/p0001_img01.png"));
    }

    #[test]
    fn manifest_without_pages_or_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), NOTE_FILE, "text\n");
        write(dir.path(), MANIFEST_FILE, r#"{"warnings": []}"#);
        assert_eq!(
            validate_output(dir.path()).unwrap().problems,
            vec!["Manifest missing pages entry"]
        );

        write(dir.path(), MANIFEST_FILE, "{oops");
        let report = validate_output(dir.path()).unwrap();
        assert_eq!(report.count(), 1);
        assert!(report.problems[0].starts_with("Manifest is not valid JSON"));
    }

    #[test]
    fn absent_manifest_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), NOTE_FILE, "text\n");
        assert!(validate_output(dir.path()).unwrap().is_ok());
    }
}
