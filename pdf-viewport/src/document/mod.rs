//! The boundary to the native document component.
//!
//! The viewport never parses PDF data itself. It talks to a [`Document`]
//! which answers page geometry questions and rasterizes pages into
//! [`PixelBuffer`]s. Implementations must be callable from render worker
//! threads.

mod pdfium;

pub use pdfium::{PdfLibrary, PdfiumDocument};

use crate::error::{DocumentError, RenderError};
use crate::layout::{PageSize, PixelSize};
use crate::rotation::Rotation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

/// A loaded, paginated document.
pub trait Document: Send + Sync {
    fn page_count(&self) -> usize;

    /// Intrinsic size of page `index`, or `None` if it does not exist.
    fn page_size(&self, index: usize) -> Option<PageSize>;

    /// Rasterize one page. This is CPU-bound and may block.
    fn render_page(&self, request: &RenderRequest) -> Result<PixelBuffer, RenderError>;
}

/// Render `request`, rejecting an empty target before the document sees it.
pub(crate) fn render_checked(
    document: &dyn Document,
    request: &RenderRequest,
) -> Result<PixelBuffer, RenderError> {
    if request.size.is_empty() {
        return Err(RenderError::EmptyTarget {
            page: request.page,
            width: request.size.width,
            height: request.size.height,
        });
    }
    document.render_page(request)
}

/// Where a document comes from.
#[derive(Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl DocumentSource {
    /// Read a whole stream into memory.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, DocumentError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| DocumentError::Io(e.to_string()))?;
        Ok(DocumentSource::Bytes(bytes))
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DocumentSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

/// Rendering switches forwarded to the rasterizer. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderFlags {
    pub annotations: bool,
    pub lcd_text: bool,
    pub grayscale: bool,
    pub print_quality: bool,
}

/// One rasterization job as seen by the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page: usize,
    pub size: PixelSize,
    pub dpi_x: f32,
    pub dpi_y: f32,
    pub rotation: Rotation,
    pub flags: RenderFlags,
}

/// An immutable RGBA bitmap produced by the rasterizer.
///
/// Dropping the buffer frees its pixels immediately.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: image::RgbaImage,
}

impl PixelBuffer {
    pub fn new(image: image::RgbaImage) -> Self {
        Self { image }
    }

    /// Build from raw RGBA bytes. Returns `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        image::RgbaImage::from_raw(width, height, pixels).map(Self::new)
    }

    /// A buffer filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(image::RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width(), self.height())
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
