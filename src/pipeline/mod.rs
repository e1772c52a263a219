//! Pipeline stages for PDF-to-note conversion.
//!
//! Each submodule implements one step and is testable on its own; the
//! orchestration (manifest, resume, file layout) lives in [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ layout ──▶ classify ──▶ markdown ──▶ toc
//!  (path)   (pdfium)   (lines)    (kinds)      (page.md)
//!              │
//!              ├──▶ ocr      rasterise + backend with timeout
//!              ├──▶ tables   lattice / stream engines → CSV + pipe table
//!              └──▶ caption  nearest text block for each image
//! ```
//!
//! 1. [`input`]: check the user-supplied path is a readable PDF
//! 2. [`source`]: glyphs, vector paths and images per page via pdfium;
//!    blocking, so callers go through [`source::run_blocking`]
//! 3. [`layout`]: glyphs → lines → blocks, top-down coordinates
//! 4. [`classify`]: code, callout, heading or plain for each line
//! 5. [`markdown`]: one page's Markdown, fences kept balanced
//! 6. [`toc`]: heading list inserted after the TOC marker
//!
//! Side stages: [`ocr`] for pages without a usable text layer, [`tables`]
//! (backed by [`table_lattice`] and [`table_stream`]), [`caption`] and
//! [`encode`] for exported images.

pub mod caption;
pub mod classify;
pub mod encode;
pub mod input;
pub mod layout;
pub mod markdown;
pub mod ocr;
pub mod source;
pub mod table_lattice;
pub mod table_stream;
pub mod tables;
pub mod toc;
