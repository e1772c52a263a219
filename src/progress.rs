//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the selected pages.
//!
//! # Example
//!
//! ```rust
//! use pdf2note::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: u32, total_pages: usize, markdown_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, markdown_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// Pages are processed sequentially, so events arrive in order. All methods
/// have default no-op implementations so callers only override what they
/// care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first selected page.
    ///
    /// # Arguments
    /// * `total_pages`: number of selected pages (including ones the
    ///   manifest will skip)
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is extracted.
    fn on_page_start(&self, page_num: u32, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after a page has been appended to the note and persisted.
    ///
    /// # Arguments
    /// * `page_num`    : 1-indexed page number
    /// * `total_pages` : number of selected pages
    /// * `markdown_len`: byte length of the Markdown appended for this page
    fn on_page_complete(&self, page_num: u32, total_pages: usize, markdown_len: usize) {
        let _ = (page_num, total_pages, markdown_len);
    }

    /// Called for a selected page that the manifest already records.
    fn on_page_skipped(&self, page_num: u32, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once after the last selected page.
    ///
    /// # Arguments
    /// * `total_pages`    : number of selected pages
    /// * `processed_count`: pages actually converted in this run
    fn on_conversion_complete(&self, total_pages: usize, processed_count: usize) {
        let _ = (total_pages, processed_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
