#![allow(dead_code)]

use pdf_viewport::dispatch::{OutcomeSender, RenderJob};
use pdf_viewport::{
    DisplayMode, Document, InlineDispatch, PageSize, PixelBuffer, RenderDispatch, RenderError,
    RenderRequest, Viewport, ViewportConfig, ZoomMode,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const VIEWPORT_WIDTH: f64 = 400.0;
pub const VIEWPORT_HEIGHT: f64 = 300.0;

/// In-memory document with fixed page sizes and optional failing pages.
pub struct FakeDocument {
    sizes: Vec<PageSize>,
    failing: HashSet<usize>,
    renders: AtomicUsize,
}

impl FakeDocument {
    /// `count` pages of 100 x 200 points.
    pub fn letter(count: usize) -> Self {
        Self::uniform(count, 100.0, 200.0)
    }

    pub fn uniform(count: usize, width: f64, height: f64) -> Self {
        Self {
            sizes: vec![PageSize::new(width, height); count],
            failing: HashSet::new(),
            renders: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, page: usize) -> Self {
        self.failing.insert(page);
        self
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl Document for FakeDocument {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, index: usize) -> Option<PageSize> {
        self.sizes.get(index).copied()
    }

    fn render_page(&self, request: &RenderRequest) -> Result<PixelBuffer, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&request.page) {
            return Err(RenderError::Backend {
                page: request.page,
                message: "corrupt content stream".to_string(),
            });
        }
        let shade = (request.page % 256) as u8;
        Ok(PixelBuffer::solid(
            request.size.width,
            request.size.height,
            [shade, shade, shade, 255],
        ))
    }
}

/// Holds jobs until the test runs them, in any order it likes.
#[derive(Clone, Default)]
pub struct ManualDispatch {
    queue: Arc<Mutex<Vec<(RenderJob, OutcomeSender)>>>,
}

impl ManualDispatch {
    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<(RenderJob, OutcomeSender)> {
        std::mem::take(&mut *self.queue.lock().unwrap())
    }

    /// Put a job back at the end of the queue.
    pub fn hold(&self, job: (RenderJob, OutcomeSender)) {
        self.queue.lock().unwrap().push(job);
    }
}

impl RenderDispatch for ManualDispatch {
    fn dispatch(&self, job: RenderJob, outcomes: &OutcomeSender) {
        self.queue.lock().unwrap().push((job, outcomes.clone()));
    }
}

pub fn explicit_config(mode: DisplayMode) -> ViewportConfig {
    ViewportConfig {
        display_mode: mode,
        zoom_mode: ZoomMode::Explicit,
        ..ViewportConfig::default()
    }
}

/// A measured viewport showing `document`, first renders installed.
pub fn loaded(config: ViewportConfig, document: Arc<FakeDocument>) -> Viewport {
    let mut viewport = Viewport::with_dispatcher(config, Box::new(InlineDispatch)).unwrap();
    viewport.resize(VIEWPORT_WIDTH, VIEWPORT_HEIGHT);
    viewport.load_document(document);
    viewport.poll_renders();
    viewport
}

pub fn loaded_manual(
    config: ViewportConfig,
    document: Arc<FakeDocument>,
) -> (Viewport, ManualDispatch) {
    let dispatch = ManualDispatch::default();
    let mut viewport = Viewport::with_dispatcher(config, Box::new(dispatch.clone())).unwrap();
    viewport.resize(VIEWPORT_WIDTH, VIEWPORT_HEIGHT);
    viewport.load_document(document);
    (viewport, dispatch)
}
