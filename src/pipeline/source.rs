//! Document access: the PDF engine behind a small trait.
//!
//! The pipeline only needs three things from a document: its metadata, the
//! raw geometry of one page (glyphs, drawn paths, embedded images) and a
//! rasterised copy of one page for OCR. [`DocumentSource`] captures exactly
//! that; [`PdfiumSource`] implements it on top of `pdfium-render`, and tests
//! substitute an in-memory document.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with internal global state and is not safe to call
//! from async contexts. Every call goes through [`run_blocking`], which moves
//! the work onto tokio's blocking pool so the runtime's worker threads never
//! stall while [`PdfiumSource`]'s document thread extracts or renders.

use crate::error::Pdf2NoteError;
use crate::output::DocumentMetadata;
use crate::pipeline::layout::{normalise_char, PdfChar, Rect};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use tracing::{debug, info};

/// Raw geometry of one page, in layout coordinates.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// 1-based page number.
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub chars: Vec<PdfChar>,
    /// Bounding boxes of vector path objects (ruling lines, cell borders).
    pub paths: Vec<Rect>,
    /// Embedded raster images in content-stream order.
    pub images: Vec<PageImage>,
}

/// One embedded image.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Placement on the page, when the engine could compute it.
    pub rect: Option<Rect>,
    /// Decoded pixels, or the engine's reason for failing to decode them.
    pub image: Result<DynamicImage, String>,
}

/// A readable PDF document.
///
/// Methods are blocking; call them through [`run_blocking`] from async code.
pub trait DocumentSource: Send + Sync {
    fn metadata(&self) -> Result<DocumentMetadata, Pdf2NoteError>;

    /// Geometry of page `number` (1-based).
    fn page(&self, number: u32) -> Result<PageContent, Pdf2NoteError>;

    /// Render page `number` (1-based) at `dpi`.
    fn rasterise(&self, number: u32, dpi: u32) -> Result<DynamicImage, Pdf2NoteError>;
}

/// Run a blocking document call on tokio's blocking pool.
pub async fn run_blocking<T, F>(source: &Arc<dyn DocumentSource>, f: F) -> Result<T, Pdf2NoteError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DocumentSource) -> Result<T, Pdf2NoteError> + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || f(source.as_ref()))
        .await
        .map_err(|e| Pdf2NoteError::Internal(format!("PDF engine task panicked: {e}")))?
}

// ── pdfium binding ───────────────────────────────────────────────────────

/// Bind the pdfium library on the calling thread.
///
/// Search order: `PDFIUM_LIB_PATH` (a library file or the directory holding
/// it), the working directory, then the system library path. Nothing is
/// downloaded.
fn bind_pdfium() -> Result<Pdfium, Pdf2NoteError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(configured) => {
            let configured = PathBuf::from(configured);
            let library = if configured.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&configured)
            } else {
                configured
            };
            debug!("Binding pdfium from PDFIUM_LIB_PATH: {}", library.display());
            Pdfium::bind_to_library(&library).map_err(|e| {
                Pdf2NoteError::PdfiumBindingFailed(format!("{}: {e:?}", library.display()))
            })?
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Pdf2NoteError::PdfiumBindingFailed(format!("{e:?}")))?,
    };
    Ok(Pdfium::new(bindings))
}

// ── pdfium-backed source ─────────────────────────────────────────────────

type Reply<T> = mpsc::SyncSender<Result<T, Pdf2NoteError>>;

/// Work for the document thread.
enum Request {
    Metadata(Reply<DocumentMetadata>),
    Page(u32, Reply<PageContent>),
    Rasterise(u32, u32, Reply<DynamicImage>),
}

/// A PDF file read through pdfium.
///
/// pdfium handles are neither `Send` nor `Sync`, so the library binding and
/// the parsed document live on one dedicated thread for the lifetime of the
/// source. Calls are forwarded over a channel and block until answered; the
/// thread exits when the source is dropped.
#[derive(Debug, Clone)]
pub struct PdfiumSource {
    path: PathBuf,
    requests: mpsc::Sender<Request>,
}

impl PdfiumSource {
    /// Bind pdfium and parse `path`, surfacing password and corruption
    /// errors before any page is requested.
    pub fn open(path: impl AsRef<Path>, password: Option<String>) -> Result<Self, Pdf2NoteError> {
        let path = path.as_ref().to_path_buf();
        let (requests, inbox) = mpsc::channel();
        let (ready, loaded) = mpsc::sync_channel(1);

        let worker_path = path.clone();
        std::thread::Builder::new()
            .name("pdfium".into())
            .spawn(move || serve(worker_path, password, ready, inbox))
            .map_err(|e| Pdf2NoteError::Internal(format!("cannot start PDF engine thread: {e}")))?;

        let pages = loaded.recv().map_err(|_| engine_gone(&path))??;
        info!("PDF loaded: {} pages", pages);
        Ok(Self { path, requests })
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T, Pdf2NoteError> {
        let (reply, answer) = mpsc::sync_channel(1);
        self.requests.send(make(reply)).map_err(|_| engine_gone(&self.path))?;
        answer.recv().map_err(|_| engine_gone(&self.path))?
    }
}

fn engine_gone(path: &Path) -> Pdf2NoteError {
    Pdf2NoteError::Internal(format!("PDF engine thread for {} exited", path.display()))
}

/// Document thread body: bind, parse once, then answer requests in order.
fn serve(
    path: PathBuf,
    password: Option<String>,
    ready: mpsc::SyncSender<Result<PdfPageIndex, Pdf2NoteError>>,
    inbox: mpsc::Receiver<Request>,
) {
    let pdfium = match bind_pdfium() {
        Ok(pdfium) => pdfium,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let document = match pdfium.load_pdf_from_file(&path, password.as_deref()) {
        Ok(document) => document,
        Err(e) => {
            let _ = ready.send(Err(load_error(&path, password.is_some(), e)));
            return;
        }
    };
    if ready.send(Ok(document.pages().len())).is_err() {
        return;
    }

    // A dropped reply receiver only means the caller gave up waiting.
    for request in inbox {
        match request {
            Request::Metadata(reply) => {
                let _ = reply.send(read_metadata(&document));
            }
            Request::Page(number, reply) => {
                let _ = reply.send(read_page(&document, number));
            }
            Request::Rasterise(number, dpi, reply) => {
                let _ = reply.send(rasterise_page(&document, number, dpi));
            }
        }
    }
    debug!("PDF engine thread for {} finished", path.display());
}

fn load_page<'a>(doc: &'a PdfDocument<'_>, number: u32) -> Result<PdfPage<'a>, Pdf2NoteError> {
    let index = number
        .checked_sub(1)
        .and_then(|i| u16::try_from(i).ok())
        .ok_or_else(|| Pdf2NoteError::ExtractionFailed {
            page: number,
            detail: "page number out of range".into(),
        })?;
    doc.pages()
        .get(index)
        .map_err(|e| Pdf2NoteError::ExtractionFailed {
            page: number,
            detail: format!("{e:?}"),
        })
}

fn load_error(path: &Path, has_password: bool, e: PdfiumError) -> Pdf2NoteError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        if has_password {
            Pdf2NoteError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            Pdf2NoteError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        Pdf2NoteError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}

fn object_rect(object: &PdfPageObject<'_>, page_height: f32) -> Option<Rect> {
    let bounds = object.bounds().ok()?;
    Some(Rect::from_pdf(
        bounds.left().value,
        bounds.bottom().value,
        bounds.right().value,
        bounds.top().value,
        page_height,
    ))
}

/// Page objects the pipeline cares about, with form XObjects kept as groups.
#[derive(Debug)]
enum Drawn {
    Image(PageImage),
    Path(Rect),
    Form(Vec<Drawn>),
}

fn read_object(object: &PdfPageObject<'_>, page_height: f32) -> Option<Drawn> {
    if let Some(image) = object.as_image_object() {
        Some(Drawn::Image(PageImage {
            rect: object_rect(object, page_height),
            image: image.get_raw_image().map_err(|e| format!("{e:?}")),
        }))
    } else if object.as_path_object().is_some() {
        object_rect(object, page_height).map(Drawn::Path)
    } else if let Some(form) = object.as_x_object_form_object() {
        let children = (0..form.len())
            .filter_map(|i| form.get(i).ok())
            .filter_map(|child| read_object(&child, page_height))
            .collect();
        Some(Drawn::Form(children))
    } else {
        None
    }
}

/// Flatten nested forms into content-stream order.
fn collect_drawn(drawn: Vec<Drawn>, paths: &mut Vec<Rect>, images: &mut Vec<PageImage>) {
    for item in drawn {
        match item {
            Drawn::Image(image) => images.push(image),
            Drawn::Path(rect) => paths.push(rect),
            Drawn::Form(children) => collect_drawn(children, paths, images),
        }
    }
}

impl DocumentSource for PdfiumSource {
    fn metadata(&self) -> Result<DocumentMetadata, Pdf2NoteError> {
        self.request(Request::Metadata)
    }

    fn page(&self, number: u32) -> Result<PageContent, Pdf2NoteError> {
        self.request(|reply| Request::Page(number, reply))
    }

    fn rasterise(&self, number: u32, dpi: u32) -> Result<DynamicImage, Pdf2NoteError> {
        self.request(|reply| Request::Rasterise(number, dpi, reply))
    }
}

fn read_metadata(document: &PdfDocument<'_>) -> Result<DocumentMetadata, Pdf2NoteError> {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: u32::from(document.pages().len()),
        pdf_version: format!("{:?}", document.version()),
    })
}

#[allow(deprecated)] // PdfRect field access deprecated in 0.8.28
fn read_page(document: &PdfDocument<'_>, number: u32) -> Result<PageContent, Pdf2NoteError> {
    let page = load_page(document, number)?;
    let width = page.width().value;
    let height = page.height().value;

    let text = page.text().map_err(|e| Pdf2NoteError::ExtractionFailed {
        page: number,
        detail: format!("{e:?}"),
    })?;

    let mut chars = Vec::new();
    for ch in text.chars().iter() {
        let (Some(c), Ok(bounds)) = (ch.unicode_char().and_then(normalise_char), ch.tight_bounds())
        else {
            continue;
        };
        let rect = Rect::from_pdf(
            bounds.left.value,
            bounds.bottom.value,
            bounds.right.value,
            bounds.top.value,
            height,
        );
        // Generated spaces carry no box; gaps are re-derived from positions.
        if c.is_whitespace() && rect.height() <= 0.0 {
            continue;
        }
        chars.push(PdfChar {
            ch: c,
            x: rect.x0,
            top: rect.top,
            width: rect.width(),
            height: rect.height(),
            font_size: ch.scaled_font_size().value,
            font_name: ch.font_name(),
        });
    }

    let drawn = page
        .objects()
        .iter()
        .filter_map(|object| read_object(&object, height))
        .collect();
    let mut paths = Vec::new();
    let mut images = Vec::new();
    collect_drawn(drawn, &mut paths, &mut images);

    debug!(
        page = number,
        chars = chars.len(),
        paths = paths.len(),
        images = images.len(),
        "Extracted page geometry"
    );

    Ok(PageContent {
        number,
        width,
        height,
        chars,
        paths,
        images,
    })
}

fn rasterise_page(document: &PdfDocument<'_>, number: u32, dpi: u32) -> Result<DynamicImage, Pdf2NoteError> {
    let page = load_page(document, number).map_err(|e| Pdf2NoteError::RasterisationFailed {
        page: number,
        detail: e.to_string(),
    })?;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| Pdf2NoteError::RasterisationFailed {
            page: number,
            detail: format!("{e:?}"),
        })?;
    let image = bitmap.as_image();
    debug!(
        page = number,
        dpi,
        "Rendered page → {}x{} px",
        image.width(),
        image.height()
    );
    Ok(image)
}
