use crate::document::PixelBuffer;
use thiserror::Error;

/// Failure to open a document. The viewport stays unloaded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("file not found or could not be opened: {0}")]
    NotFound(String),

    #[error("file not in PDF format or corrupted")]
    InvalidFormat,

    #[error("password required or incorrect password")]
    PasswordProtected,

    #[error("unsupported security scheme")]
    UnsupportedSecurity,

    #[error("page not found or content error")]
    PageError,

    #[error("failed to read document source: {0}")]
    Io(String),

    #[error("PDF library unavailable: {0}")]
    Library(String),
}

/// A single page failed to rasterize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("page {0} is out of range")]
    PageOutOfRange(usize),

    #[error("page {page} cannot be rendered at {width}x{height}")]
    EmptyTarget { page: usize, width: u32, height: u32 },

    #[error("renderer failed on page {page}: {message}")]
    Backend { page: usize, message: String },

    #[error("render worker for page {0} went away")]
    Disconnected(usize),
}

/// Aggregated failure of a bulk render sweep. Pages rendered before the
/// failure are kept in `completed`.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export cancelled after {} page(s)", .completed.len())]
    Cancelled { completed: Vec<PixelBuffer> },

    #[error("export failed on page {page} after {} page(s): {source}", .completed.len())]
    Render {
        page: usize,
        #[source]
        source: RenderError,
        completed: Vec<PixelBuffer>,
    },

    #[error("no document loaded")]
    NoDocument,
}

impl ExportError {
    /// Pages that were rendered before the sweep stopped.
    pub fn completed(&self) -> &[PixelBuffer] {
        match self {
            ExportError::Cancelled { completed } | ExportError::Render { completed, .. } => {
                completed
            }
            ExportError::NoDocument => &[],
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("zoom bounds must be positive (min {min}, max {max})")]
    NonPositiveZoom { min: f64, max: f64 },

    #[error("zoom_min {min} exceeds zoom_max {max}")]
    InvertedZoomBounds { min: f64, max: f64 },

    #[error("zoom_factor must be greater than 1, got {0}")]
    ZoomFactor(f64),

    #[error("friction must lie in (0, 1), got {0}")]
    Friction(f64),

    #[error("kinetic tick interval must be non-zero")]
    TickInterval,

    #[error("dpi must be positive, got {0}")]
    Dpi(f32),
}
