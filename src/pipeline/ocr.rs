//! OCR fallback: decide when a page needs it, and run it safely.
//!
//! A page goes through OCR when its native text layer is nearly empty. The
//! page is rasterised, PNG-encoded and handed to an [`OcrBackend`] under a
//! timeout. Anything that goes wrong (no backend, a backend error, a panic,
//! a hang) leaves the page with its native content and at most a
//! [`PageWarning`]; OCR never fails a run.
//!
//! Backends that wrap an external program run it as a child process that is
//! killed when the timeout expires. In-process backends run on a detached
//! thread, so a hung one cannot keep the runtime from shutting down.

use crate::error::{PageWarning, Pdf2NoteError};
use crate::pipeline::encode::encode_png;
use crate::pipeline::layout::TextLine;
use crate::pipeline::source::{run_blocking, DocumentSource};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Pages whose joined native text is shorter than this go through OCR.
pub const MIN_NATIVE_TEXT_CHARS: usize = 20;

/// Font size of the synthetic OCR line when the page has no body size.
const FALLBACK_FONT_SIZE: f32 = 10.0;

/// Errors from an OCR backend.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The backend cannot run on this machine.
    #[error("OCR backend not available: {0}")]
    NotAvailable(String),

    /// The backend ran but did not produce text.
    #[error("OCR processing failed: {0}")]
    ProcessingFailed(String),

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that turns a PNG into text.
///
/// [`recognize`](OcrBackend::recognize) is called from a dedicated thread
/// and may block.
pub trait OcrBackend: Send + Sync {
    /// Short engine name recorded in logs.
    fn name(&self) -> &str;

    /// Checked once at startup. Backends that say no are never called.
    fn is_available(&self) -> bool {
        true
    }

    /// Recognise the text in `png` using `language` (e.g. `eng`).
    fn recognize(&self, png: &[u8], language: &str) -> Result<String, OcrError>;

    /// The external program behind this backend, if there is one: PNG on
    /// stdin, text on stdout. When set it is used instead of `recognize`.
    fn command(&self, _language: &str) -> Option<Command> {
        None
    }
}

/// The `tesseract` command-line engine: PNG on stdin, text on stdout.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    binary: PathBuf,
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }
}

impl TesseractBackend {
    /// Use a specific `tesseract` executable.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn recognize(&self, png: &[u8], language: &str) -> Result<String, OcrError> {
        let mut command = self.tesseract(language);
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OcrError::NotAvailable(format!("{}: {e}", self.binary.display())))?;

        // tesseract reads the whole image before writing anything, so writing
        // stdin to completion first cannot deadlock on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png)?;
        }
        command_output(&self.binary.to_string_lossy(), child.wait_with_output()?)
    }

    fn command(&self, language: &str) -> Option<Command> {
        Some(self.tesseract(language))
    }
}

impl TesseractBackend {
    fn tesseract(&self, language: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(["stdin", "stdout", "-l", language]);
        command
    }
}

fn command_output(program: &str, output: Output) -> Result<String, OcrError> {
    if !output.status.success() {
        return Err(OcrError::ProcessingFailed(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run an OCR program as a child process, killed if this future is dropped.
async fn run_command(command: Command, png: Vec<u8>) -> Result<String, OcrError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut command = tokio::process::Command::from(command);
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| OcrError::NotAvailable(format!("{program}: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(&png).await?;
    }
    command_output(&program, child.wait_with_output().await?)
}

/// Run an in-process backend on its own thread.
///
/// The thread is detached: after a timeout it runs to completion on its own
/// and its answer is discarded.
async fn run_detached(
    backend: Arc<dyn OcrBackend>,
    png: Vec<u8>,
    language: String,
) -> Result<String, OcrError> {
    let (reply, answer) = oneshot::channel();
    std::thread::Builder::new()
        .name("ocr".into())
        .spawn(move || {
            let _ = reply.send(backend.recognize(&png, &language));
        })?;
    answer
        .await
        .map_err(|_| OcrError::ProcessingFailed("OCR worker crashed".into()))?
}

/// Result of the OCR step for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrResult {
    /// Recognised text, stripped.
    pub text: String,
    pub used_ocr: bool,
    /// Backend name when OCR ran.
    pub engine: Option<String>,
}

/// Does this page need OCR?
///
/// True when the native lines joined by single spaces and stripped are
/// shorter than [`MIN_NATIVE_TEXT_CHARS`], or when there is no body size.
pub fn should_ocr(lines: &[TextLine], body_size: f32) -> bool {
    let joined = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    joined.trim().chars().count() < MIN_NATIVE_TEXT_CHARS || body_size == 0.0
}

/// The line OCR text is appended as: after every native line on the page.
pub fn synthetic_line(text: &str, body_size: f32, page_height: f32) -> TextLine {
    TextLine {
        text: text.to_string(),
        font_size: if body_size > 0.0 {
            body_size
        } else {
            FALLBACK_FONT_SIZE
        },
        font_name: "OCR".to_string(),
        x: 0.0,
        y: page_height,
        is_mono: false,
    }
}

/// Runs the configured backend for one page at a time.
#[derive(Clone)]
pub struct OcrEngine {
    backend: Option<Arc<dyn OcrBackend>>,
    language: String,
    dpi: u32,
    timeout: Duration,
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("language", &self.language)
            .field("dpi", &self.dpi)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OcrEngine {
    /// `backend` is `None` when no usable backend was found.
    pub fn new(
        backend: Option<Arc<dyn OcrBackend>>,
        language: impl Into<String>,
        dpi: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            language: language.into(),
            dpi,
            timeout,
        }
    }

    /// OCR page `page`, returning the result and any warning to record.
    ///
    /// Never fails: every problem is folded into `used_ocr = false`.
    pub async fn run(
        &self,
        source: &Arc<dyn DocumentSource>,
        page: u32,
    ) -> (OcrResult, Option<PageWarning>) {
        let Some(backend) = self.backend.clone() else {
            info!(page, "Page needs OCR but no OCR backend is available");
            return (OcrResult::default(), Some(PageWarning::OcrUnavailable { page }));
        };

        let dpi = self.dpi;
        let png = run_blocking(source, move |doc| {
            let image = doc.rasterise(page, dpi)?;
            encode_png(&image).map_err(|e| Pdf2NoteError::RasterisationFailed {
                page,
                detail: format!("PNG encoding failed: {e}"),
            })
        })
        .await;
        let png = match png {
            Ok(png) => png,
            Err(e) => {
                warn!(page, "Could not rasterise page for OCR: {e}");
                return failed(page, e.to_string());
            }
        };

        let engine = backend.name().to_string();
        debug!(page, dpi, engine = %engine, bytes = png.len(), "Running OCR");
        let outcome = match backend.command(&self.language) {
            Some(command) => tokio::time::timeout(self.timeout, run_command(command, png)).await,
            None => {
                let work = run_detached(backend, png, self.language.clone());
                tokio::time::timeout(self.timeout, work).await
            }
        };

        match outcome {
            Err(_) => {
                let secs = self.timeout.as_secs();
                warn!(page, secs, "OCR timed out");
                (OcrResult::default(), Some(PageWarning::OcrTimeout { page, secs }))
            }
            Ok(Err(e)) => {
                warn!(page, "OCR failed: {e}");
                failed(page, e.to_string())
            }
            Ok(Ok(text)) => {
                let text = text.trim().to_string();
                info!(page, chars = text.chars().count(), engine = %engine, "OCR complete");
                (
                    OcrResult {
                        text,
                        used_ocr: true,
                        engine: Some(engine),
                    },
                    None,
                )
            }
        }
    }
}

fn failed(page: u32, detail: String) -> (OcrResult, Option<PageWarning>) {
    (OcrResult::default(), Some(PageWarning::OcrFailed { page, detail }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DocumentMetadata;
    use crate::pipeline::source::PageContent;
    use image::{DynamicImage, RgbImage};
    use std::time::Instant;

    struct BlankDoc;

    impl DocumentSource for BlankDoc {
        fn metadata(&self) -> Result<DocumentMetadata, Pdf2NoteError> {
            Ok(DocumentMetadata::default())
        }
        fn page(&self, number: u32) -> Result<PageContent, Pdf2NoteError> {
            Ok(PageContent {
                number,
                ..Default::default()
            })
        }
        fn rasterise(&self, number: u32, _dpi: u32) -> Result<DynamicImage, Pdf2NoteError> {
            if number == 99 {
                return Err(Pdf2NoteError::RasterisationFailed {
                    page: number,
                    detail: "boom".into(),
                });
            }
            Ok(DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
        }
    }

    enum Behaviour {
        Text(&'static str),
        Fail,
        Panic,
        Hang,
    }

    struct MockOcr(Behaviour);

    impl OcrBackend for MockOcr {
        fn name(&self) -> &str {
            "mock"
        }
        fn recognize(&self, png: &[u8], language: &str) -> Result<String, OcrError> {
            assert_eq!(&png[1..4], b"PNG");
            assert_eq!(language, "eng");
            match self.0 {
                Behaviour::Text(t) => Ok(t.to_string()),
                Behaviour::Fail => Err(OcrError::ProcessingFailed("bad scan".into())),
                Behaviour::Panic => panic!("backend crashed"),
                Behaviour::Hang => {
                    std::thread::sleep(Duration::from_secs(2));
                    Ok("late".into())
                }
            }
        }
    }

    fn engine(behaviour: Behaviour) -> OcrEngine {
        OcrEngine::new(
            Some(Arc::new(MockOcr(behaviour))),
            "eng",
            220,
            Duration::from_millis(200),
        )
    }

    fn doc() -> Arc<dyn DocumentSource> {
        Arc::new(BlankDoc)
    }

    fn line(text: &str) -> TextLine {
        TextLine {
            text: text.into(),
            font_size: 10.0,
            font_name: "Helvetica".into(),
            x: 0.0,
            y: 0.0,
            is_mono: false,
        }
    }

    #[test]
    fn decision_thresholds() {
        assert!(should_ocr(&[], 0.0));
        assert!(should_ocr(&[line("short text")], 10.0));
        assert!(!should_ocr(&[line("this line is long enough")], 10.0));
        // Joined with spaces: 9 + 1 + 10 = 20 chars.
        assert!(!should_ocr(&[line("123456789"), line("1234567890")], 10.0));
        assert!(should_ocr(&[line("this line is long enough")], 0.0));
    }

    #[test]
    fn synthetic_line_shape() {
        let l = synthetic_line("scanned", 0.0, 792.0);
        assert_eq!(l.font_size, 10.0);
        assert_eq!(l.font_name, "OCR");
        assert_eq!((l.x, l.y), (0.0, 792.0));
        assert!(!l.is_mono);
        assert_eq!(synthetic_line("x", 11.0, 792.0).font_size, 11.0);
    }

    #[test]
    fn missing_tesseract_binary_is_unavailable() {
        let backend = TesseractBackend::with_binary("/nonexistent/tesseract-binary");
        assert!(!backend.is_available());
        assert!(matches!(
            backend.recognize(b"png", "eng"),
            Err(OcrError::NotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn successful_ocr_is_stripped() {
        let (result, warning) = engine(Behaviour::Text("  Scanned words \n")).run(&doc(), 1).await;
        assert!(result.used_ocr);
        assert_eq!(result.text, "Scanned words");
        assert_eq!(result.engine.as_deref(), Some("mock"));
        assert!(warning.is_none());
    }

    #[tokio::test]
    async fn no_backend_degrades() {
        let engine = OcrEngine::new(None, "eng", 220, Duration::from_secs(1));
        let (result, warning) = engine.run(&doc(), 4).await;
        assert!(!result.used_ocr);
        assert_eq!(warning, Some(PageWarning::OcrUnavailable { page: 4 }));
    }

    #[tokio::test]
    async fn backend_error_becomes_warning() {
        let (result, warning) = engine(Behaviour::Fail).run(&doc(), 2).await;
        assert!(!result.used_ocr);
        assert!(matches!(warning, Some(PageWarning::OcrFailed { page: 2, .. })));
    }

    #[tokio::test]
    async fn backend_panic_becomes_warning() {
        let (result, warning) = engine(Behaviour::Panic).run(&doc(), 3).await;
        assert!(!result.used_ocr);
        assert!(matches!(warning, Some(PageWarning::OcrFailed { page: 3, .. })));
    }

    #[tokio::test]
    async fn hung_backend_times_out() {
        let (result, warning) = engine(Behaviour::Hang).run(&doc(), 5).await;
        assert!(!result.used_ocr);
        assert!(matches!(warning, Some(PageWarning::OcrTimeout { page: 5, .. })));
    }

    #[test]
    fn hung_backend_does_not_hold_the_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let started = Instant::now();
        let (_, warning) = runtime.block_on(engine(Behaviour::Hang).run(&doc(), 5));
        drop(runtime);
        assert!(matches!(warning, Some(PageWarning::OcrTimeout { page: 5, .. })));
        assert!(started.elapsed() < Duration::from_millis(1500), "{:?}", started.elapsed());
    }

    /// A command backend whose program never finishes.
    #[cfg(unix)]
    struct StuckProgram;

    #[cfg(unix)]
    impl OcrBackend for StuckProgram {
        fn name(&self) -> &str {
            "stuck"
        }
        fn recognize(&self, _png: &[u8], _language: &str) -> Result<String, OcrError> {
            Err(OcrError::NotAvailable("only runs as a command".into()))
        }
        fn command(&self, _language: &str) -> Option<Command> {
            let mut command = Command::new("sh");
            command.args(["-c", "exec sleep 30"]);
            Some(command)
        }
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_command_is_killed() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = OcrEngine::new(Some(Arc::new(StuckProgram)), "eng", 220, Duration::from_millis(300));
        let started = Instant::now();
        let (result, warning) = runtime.block_on(engine.run(&doc(), 6));
        drop(runtime);
        assert!(!result.used_ocr);
        assert!(matches!(warning, Some(PageWarning::OcrTimeout { page: 6, .. })));
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_backend_output_is_used() {
        struct Echo;
        impl OcrBackend for Echo {
            fn name(&self) -> &str {
                "echo"
            }
            fn recognize(&self, _png: &[u8], _language: &str) -> Result<String, OcrError> {
                Err(OcrError::NotAvailable("only runs as a command".into()))
            }
            fn command(&self, language: &str) -> Option<Command> {
                let mut command = Command::new("sh");
                command.args(["-c", "cat >/dev/null; echo \"  words in $0 \"", language]);
                Some(command)
            }
        }

        let engine = OcrEngine::new(Some(Arc::new(Echo)), "eng", 220, Duration::from_secs(5));
        let (result, warning) = engine.run(&doc(), 1).await;
        assert!(warning.is_none(), "{warning:?}");
        assert_eq!(result.text, "words in eng");
        assert_eq!(result.engine.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn rasterise_failure_becomes_warning() {
        let (result, warning) = engine(Behaviour::Text("x")).run(&doc(), 99).await;
        assert!(!result.used_ocr);
        assert!(matches!(warning, Some(PageWarning::OcrFailed { page: 99, .. })));
    }
}
