use super::{Document, DocumentSource, PixelBuffer, RenderRequest};
use crate::error::{DocumentError, RenderError};
use crate::layout::PageSize;
use crate::rotation::Rotation;
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

type DocumentId = u64;

enum Command {
    Open {
        id: DocumentId,
        source: DocumentSource,
        password: Option<String>,
        reply: mpsc::Sender<Result<Vec<PageSize>, DocumentError>>,
    },
    Render {
        id: DocumentId,
        request: RenderRequest,
        reply: mpsc::Sender<Result<PixelBuffer, RenderError>>,
    },
    Close {
        id: DocumentId,
    },
    Shutdown,
}

/// The pdfium thread and the number of live references to it.
struct LibraryHost {
    commands: mpsc::Sender<Command>,
    thread: Option<JoinHandle<()>>,
    references: usize,
}

static LIBRARY: Mutex<Option<LibraryHost>> = Mutex::new(None);
static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

fn lock_library() -> MutexGuard<'static, Option<LibraryHost>> {
    match LIBRARY.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Counted reference to the process-wide pdfium library.
///
/// Pdfium is not thread safe, so every call into it runs on one dedicated
/// thread. The first reference binds the library and starts that thread;
/// dropping the last reference shuts it down and releases the library.
pub struct PdfLibrary {
    commands: mpsc::Sender<Command>,
}

impl PdfLibrary {
    pub fn acquire() -> Result<Self, DocumentError> {
        let mut guard = lock_library();
        if guard.is_none() {
            *guard = Some(LibraryHost::start()?);
        }
        let Some(host) = guard.as_mut() else {
            return Err(DocumentError::Library("library host missing".to_string()));
        };
        host.references += 1;
        debug!(references = host.references, "pdfium library acquired");
        Ok(Self {
            commands: host.commands.clone(),
        })
    }

    /// Number of live references. Zero means the library is not loaded.
    pub fn reference_count() -> usize {
        lock_library().as_ref().map_or(0, |host| host.references)
    }

    fn send(&self, command: Command) -> Result<(), DocumentError> {
        self.commands
            .send(command)
            .map_err(|_| DocumentError::Library("pdfium thread stopped".to_string()))
    }
}

impl Drop for PdfLibrary {
    fn drop(&mut self) {
        let finished = {
            let mut guard = lock_library();
            match guard.as_mut() {
                Some(host) => {
                    host.references = host.references.saturating_sub(1);
                    debug!(references = host.references, "pdfium library released");
                    if host.references == 0 {
                        guard.take()
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some(mut host) = finished {
            let _ = host.commands.send(Command::Shutdown);
            if let Some(thread) = host.thread.take() {
                if thread.join().is_err() {
                    warn!("pdfium thread panicked during shutdown");
                }
            }
        }
    }
}

impl LibraryHost {
    fn start() -> Result<Self, DocumentError> {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("pdfium".to_string())
            .spawn(move || run_library(receiver, ready_tx))
            .map_err(|e| DocumentError::Library(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                thread: Some(thread),
                references: 0,
            }),
            Ok(Err(error)) => {
                let _ = thread.join();
                Err(error)
            }
            Err(_) => {
                let _ = thread.join();
                Err(DocumentError::Library(
                    "pdfium thread exited during startup".to_string(),
                ))
            }
        }
    }
}

fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())?;
    Ok(Pdfium::new(bindings))
}

fn run_library(
    receiver: mpsc::Receiver<Command>,
    ready: mpsc::Sender<Result<(), DocumentError>>,
) {
    let pdfium = match bind_pdfium() {
        Ok(pdfium) => {
            let _ = ready.send(Ok(()));
            pdfium
        }
        Err(e) => {
            let _ = ready.send(Err(DocumentError::Library(format!(
                "failed to bind to PDFium: {e}. Install PDFium or download it from https://github.com/bblanchon/pdfium-binaries"
            ))));
            return;
        }
    };
    info!("pdfium library loaded");

    let mut documents: HashMap<DocumentId, PdfDocument<'_>> = HashMap::new();
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Open {
                id,
                source,
                password,
                reply,
            } => {
                let result = open_document(&pdfium, source, password).and_then(|document| {
                    let sizes = page_sizes(&document)?;
                    documents.insert(id, document);
                    Ok(sizes)
                });
                let _ = reply.send(result);
            }
            Command::Render { id, request, reply } => {
                let result = match documents.get(&id) {
                    Some(document) => render(document, &request),
                    None => Err(RenderError::Backend {
                        page: request.page,
                        message: "document is closed".to_string(),
                    }),
                };
                let _ = reply.send(result);
            }
            Command::Close { id } => {
                documents.remove(&id);
                debug!(document = id, "pdfium document closed");
            }
            Command::Shutdown => break,
        }
    }

    documents.clear();
    info!("pdfium library unloaded");
}

fn open_document(
    pdfium: &Pdfium,
    source: DocumentSource,
    password: Option<String>,
) -> Result<PdfDocument<'_>, DocumentError> {
    pdfium
        .load_pdf_from_byte_vec(source_bytes(source)?, password.as_deref())
        .map_err(open_error)
}

/// The whole document as bytes, reading files from disk.
fn source_bytes(source: DocumentSource) -> Result<Vec<u8>, DocumentError> {
    match source {
        DocumentSource::Path(path) => std::fs::read(&path)
            .map_err(|e| DocumentError::NotFound(format!("{}: {e}", path.display()))),
        DocumentSource::Bytes(bytes) => Ok(bytes),
    }
}

fn open_error(error: PdfiumError) -> DocumentError {
    match error {
        PdfiumError::PdfiumLibraryInternalError(internal) => match internal {
            PdfiumInternalError::FileError => {
                DocumentError::NotFound("pdfium could not open the file".to_string())
            }
            PdfiumInternalError::PasswordError => DocumentError::PasswordProtected,
            PdfiumInternalError::SecurityError => DocumentError::UnsupportedSecurity,
            PdfiumInternalError::PageError => DocumentError::PageError,
            _ => DocumentError::InvalidFormat,
        },
        other => DocumentError::Library(other.to_string()),
    }
}

fn page_sizes(document: &PdfDocument<'_>) -> Result<Vec<PageSize>, DocumentError> {
    let pages = document.pages();
    (0..pages.len())
        .map(|index| {
            pages
                .get(index)
                .map(|page| PageSize::new(page.width().value as f64, page.height().value as f64))
                .map_err(|_| DocumentError::PageError)
        })
        .collect()
}

fn render_rotation(rotation: Rotation) -> PdfPageRenderRotation {
    match rotation {
        Rotation::Rotate0 => PdfPageRenderRotation::None,
        Rotation::Rotate90 => PdfPageRenderRotation::Degrees90,
        Rotation::Rotate180 => PdfPageRenderRotation::Degrees180,
        Rotation::Rotate270 => PdfPageRenderRotation::Degrees270,
    }
}

fn render(document: &PdfDocument<'_>, request: &RenderRequest) -> Result<PixelBuffer, RenderError> {
    let index =
        u16::try_from(request.page).map_err(|_| RenderError::PageOutOfRange(request.page))?;
    let page = document
        .pages()
        .get(index)
        .map_err(|_| RenderError::PageOutOfRange(request.page))?;

    // The target size is already in rotated orientation.
    let config = PdfRenderConfig::new()
        .set_target_width(request.size.width as i32)
        .set_target_height(request.size.height as i32)
        .rotate(render_rotation(request.rotation), false)
        .render_annotations(request.flags.annotations)
        .use_lcd_text_rendering(request.flags.lcd_text)
        .use_grayscale_rendering(request.flags.grayscale)
        .use_print_quality(request.flags.print_quality);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| RenderError::Backend {
            page: request.page,
            message: e.to_string(),
        })?;

    let width = bitmap.width().max(0) as u32;
    let height = bitmap.height().max(0) as u32;
    PixelBuffer::from_rgba(width, height, bitmap.as_rgba_bytes().to_vec()).ok_or_else(|| {
        RenderError::Backend {
            page: request.page,
            message: "bitmap size does not match its pixel data".to_string(),
        }
    })
}

/// A document opened through pdfium.
pub struct PdfiumDocument {
    id: DocumentId,
    page_sizes: Vec<PageSize>,
    library: PdfLibrary,
}

impl PdfiumDocument {
    pub fn open(source: DocumentSource, password: Option<&str>) -> Result<Self, DocumentError> {
        if let DocumentSource::Path(path) = &source {
            if !path.is_file() {
                return Err(DocumentError::NotFound(path.display().to_string()));
            }
        }

        let library = PdfLibrary::acquire()?;
        let id = NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = mpsc::channel();
        library.send(Command::Open {
            id,
            source,
            password: password.map(str::to_string),
            reply,
        })?;
        let page_sizes = response
            .recv()
            .map_err(|_| DocumentError::Library("pdfium thread stopped".to_string()))??;

        info!(document = id, pages = page_sizes.len(), "opened PDF document");
        Ok(Self {
            id,
            page_sizes,
            library,
        })
    }
}

impl fmt::Debug for PdfiumDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfiumDocument")
            .field("id", &self.id)
            .field("pages", &self.page_sizes.len())
            .finish()
    }
}

impl Document for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_size(&self, index: usize) -> Option<PageSize> {
        self.page_sizes.get(index).copied()
    }

    fn render_page(&self, request: &RenderRequest) -> Result<PixelBuffer, RenderError> {
        let (reply, response) = mpsc::channel();
        self.library
            .send(Command::Render {
                id: self.id,
                request: *request,
                reply,
            })
            .map_err(|_| RenderError::Disconnected(request.page))?;
        response
            .recv()
            .map_err(|_| RenderError::Disconnected(request.page))?
    }
}

impl Drop for PdfiumDocument {
    fn drop(&mut self) {
        let _ = self.library.send(Command::Close { id: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported_before_loading_the_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pdf");
        let result = PdfiumDocument::open(DocumentSource::Path(path), None);
        assert!(matches!(result, Err(DocumentError::NotFound(_))));
        assert_eq!(PdfLibrary::reference_count(), 0);
    }

    #[test]
    fn file_sources_are_read_into_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert_eq!(
            source_bytes(DocumentSource::Path(path)).unwrap(),
            b"%PDF-1.4".to_vec()
        );
        assert!(matches!(
            source_bytes(DocumentSource::Path(dir.path().join("gone.pdf"))),
            Err(DocumentError::NotFound(_))
        ));
        assert_eq!(source_bytes(DocumentSource::Bytes(vec![1, 2])).unwrap(), vec![1, 2]);
    }

    #[test]
    fn rotations_map_to_pdfium_quarter_turns() {
        assert!(matches!(
            render_rotation(Rotation::Rotate90),
            PdfPageRenderRotation::Degrees90
        ));
        assert!(matches!(
            render_rotation(Rotation::Rotate0),
            PdfPageRenderRotation::None
        ));
    }
}
