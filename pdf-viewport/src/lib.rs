//! A scrollable, zoomable, rotatable PDF page viewport.
//!
//! [`Viewport`] lays pages out for the current zoom, rotation and display
//! mode, renders only the pages that are visible, and keeps drag, wheel and
//! keyboard scrolling in sync with what is cached. Rasterization goes through
//! the [`Document`] trait; [`PdfiumDocument`] is the pdfium-backed one.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod export;
pub mod frames;
pub mod kinetic;
pub mod layout;
pub mod navigation;
pub mod rotation;
pub mod scroll;
pub mod viewport;
pub mod zoom;

pub use config::{KineticConfig, ViewportConfig};
pub use dispatch::{InlineDispatch, RenderDispatch, WorkerPool};
pub use document::{
    Document, DocumentSource, PdfLibrary, PdfiumDocument, PixelBuffer, RenderFlags, RenderRequest,
};
pub use error::{ConfigError, DocumentError, ExportError, RenderError};
pub use export::{render_all_pages, CancellationToken, ExportJob};
pub use kinetic::{InertiaId, KineticPhase, Point};
pub use layout::{DisplayMode, PageSize, PixelSize, ZoomMode};
pub use rotation::Rotation;
pub use scroll::{Orientation, ScrollAction};
pub use viewport::{ViewerEvent, Viewport, WheelMode};
