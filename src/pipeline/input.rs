//! Input resolution: validate that the user-supplied path is a readable PDF.
//!
//! Only local files are accepted. We check the PDF magic bytes (`%PDF`)
//! before handing the path to pdfium so callers get a meaningful error rather
//! than an opaque engine failure.

use crate::error::Pdf2NoteError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve the input path, validating existence, permissions and magic bytes.
pub fn resolve_input(input: impl AsRef<Path>) -> Result<PathBuf, Pdf2NoteError> {
    let path = input.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Pdf2NoteError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                // Shorter than four bytes: report what we have.
                _ => return Err(Pdf2NoteError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2NoteError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2NoteError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Pdf2NoteError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path()).unwrap_err();
        assert!(matches!(err, Pdf2NoteError::FileNotFound { .. }));
    }

    #[test]
    fn rejects_non_pdf_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zip").unwrap();
        match resolve_input(f.path()).unwrap_err() {
            Pdf2NoteError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_tiny_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_input(f.path()).unwrap_err(),
            Pdf2NoteError::NotAPdf { .. }
        ));
    }

    #[test]
    fn accepts_pdf_header() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_input(f.path()).unwrap(), f.path());
    }
}
