//! Image encoding: `DynamicImage` → PNG bytes or PNG file.
//!
//! PNG is lossless, which keeps rasterised text crisp for OCR. Exported
//! embedded images are normalised to RGBA first so CMYK or 16-bit sources
//! still produce a file every Markdown viewer can open.

use crate::error::Pdf2NoteError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode an image as PNG in memory.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Write an image to `path` as an RGBA PNG.
pub fn save_png(img: &DynamicImage, path: &Path) -> Result<(), Pdf2NoteError> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let bytes = encode_png(&rgba).map_err(|e| Pdf2NoteError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    std::fs::write(path, bytes).map_err(|e| Pdf2NoteError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([120, 160, 200])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn save_png_round_trips_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p0001_img01.png");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 6, Rgb([1, 2, 3])));
        save_png(&img, &path).unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (12, 6));
    }

    #[test]
    fn save_png_reports_unwritable_path() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
        let err = save_png(&img, Path::new("/nonexistent-dir/x.png")).unwrap_err();
        assert!(matches!(err, Pdf2NoteError::OutputWriteFailed { .. }));
    }
}
