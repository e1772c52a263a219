//! Configuration types for PDF-to-note conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The binary maps CLI flags onto the
//! builder; library callers set only what they care about and rely on the
//! documented defaults for the rest.

use crate::error::Pdf2NoteError;
use crate::pipeline::ocr::OcrBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one conversion run.
///
/// # Example
/// ```rust
/// use pdf2note::{ConversionConfig, Mode};
///
/// let config = ConversionConfig::builder()
///     .mode(Mode::Accurate)
///     .pages("1-3,7".parse().unwrap())
///     .toc(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_dpi(), 300);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Fast vs accurate extraction. Default: [`Mode::Fast`].
    pub mode: Mode,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Discard the manifest and `page.md` before starting. Default: false.
    pub force: bool,

    /// Insert a table of contents after the `<!-- toc -->` marker. Default: false.
    pub toc: bool,

    /// Language tag written on every opening code fence. Default: `csharp`.
    pub code_language: String,

    /// Language passed to the OCR backend. Default: `eng`.
    pub ocr_language: String,

    /// Upper bound for one OCR call, in seconds. Default: 120.
    ///
    /// A backend that hangs past this is abandoned and the page is treated
    /// as if OCR were unavailable.
    pub ocr_timeout_secs: u64,

    /// Rasterisation DPI for OCR in fast mode. Default: 220.
    pub fast_dpi: u32,

    /// Rasterisation DPI for OCR in accurate mode. Default: 300.
    pub accurate_dpi: u32,

    /// Run the table engines at all. Default: true.
    pub extract_tables: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pre-constructed OCR backend. Takes precedence over the tesseract lookup.
    pub ocr_backend: Option<Arc<dyn OcrBackend>>,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            pages: PageSelection::default(),
            force: false,
            toc: false,
            code_language: "csharp".to_string(),
            ocr_language: "eng".to_string(),
            ocr_timeout_secs: 120,
            fast_dpi: 220,
            accurate_dpi: 300,
            extract_tables: true,
            password: None,
            ocr_backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("pages", &self.pages)
            .field("force", &self.force)
            .field("toc", &self.toc)
            .field("code_language", &self.code_language)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("fast_dpi", &self.fast_dpi)
            .field("accurate_dpi", &self.accurate_dpi)
            .field("extract_tables", &self.extract_tables)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ocr_backend", &self.ocr_backend.as_ref().map(|b| b.name()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// DPI used to rasterise a page for OCR in the configured mode.
    pub fn ocr_dpi(&self) -> u32 {
        match self.mode {
            Mode::Fast => self.fast_dpi,
            Mode::Accurate => self.accurate_dpi,
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn toc(mut self, v: bool) -> Self {
        self.config.toc = v;
        self
    }

    pub fn code_language(mut self, lang: impl Into<String>) -> Self {
        self.config.code_language = lang.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn fast_dpi(mut self, dpi: u32) -> Self {
        self.config.fast_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn accurate_dpi(mut self, dpi: u32) -> Self {
        self.config.accurate_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn extract_tables(mut self, v: bool) -> Self {
        self.config.extract_tables = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.ocr_backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2NoteError> {
        let c = &self.config;
        if c.code_language.chars().any(char::is_whitespace) {
            return Err(Pdf2NoteError::InvalidConfig(format!(
                "code language must be a single word, got {:?}",
                c.code_language
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(Pdf2NoteError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Extraction mode.
///
/// | Mode | OCR DPI | Table engines |
/// |------|---------|---------------|
/// | fast | 220 | stream only |
/// | accurate | 300 | lattice, then stream |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Fast,
    Accurate,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Fast => f.write_str("fast"),
            Mode::Accurate => f.write_str("accurate"),
        }
    }
}

impl FromStr for Mode {
    type Err = Pdf2NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "accurate" => Ok(Mode::Accurate),
            other => Err(Pdf2NoteError::InvalidConfig(format!(
                "mode must be 'fast' or 'accurate', got '{other}'"
            ))),
        }
    }
}

/// An inclusive, 1-based run of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

/// Specifies which pages of the PDF to convert.
///
/// Parsed from the `--pages` grammar: comma-separated page numbers or
/// inclusive ranges `a-b`. Empty chunks are ignored; `all` (or an empty
/// string) selects every page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert the listed spans, in the order given.
    Spans(Vec<PageSpan>),
}

impl PageSelection {
    /// Expand the selection into 1-based page numbers for a document with
    /// `total_pages` pages. Out-of-range numbers are dropped; order and
    /// repeats follow the selection as written.
    pub fn to_pages(&self, total_pages: u32) -> Vec<u32> {
        match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Spans(spans) => spans
                .iter()
                .flat_map(|span| span.start..=span.end)
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        }
    }
}

impl FromStr for PageSelection {
    type Err = Pdf2NoteError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let trimmed = spec.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        let invalid = |reason: String| Pdf2NoteError::InvalidPageSpec {
            spec: spec.to_string(),
            reason,
        };
        let number = |token: &str| -> Result<u32, Pdf2NoteError> {
            token
                .trim()
                .parse::<u32>()
                .map_err(|_| invalid(format!("'{}' is not a page number", token.trim())))
        };

        let mut spans = Vec::new();
        for chunk in trimmed.split(',') {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            let span = match chunk.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (number(start)?, number(end)?);
                    if start > end {
                        return Err(invalid(format!(
                            "range '{chunk}' is inverted: start must be <= end"
                        )));
                    }
                    PageSpan { start, end }
                }
                None => {
                    let page = number(chunk)?;
                    PageSpan {
                        start: page,
                        end: page,
                    }
                }
            };
            spans.push(span);
        }
        Ok(PageSelection::Spans(spans))
    }
}
