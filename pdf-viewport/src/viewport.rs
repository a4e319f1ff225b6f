//! The viewport: document, slots, cache, scroll state and the updates that
//! keep them consistent.
//!
//! A `Viewport` is owned by one interactive thread. Every method runs a
//! complete update before returning; renders are handed to a
//! [`RenderDispatch`] and come back through [`Viewport::poll_renders`].

use crate::cache::RenderCache;
use crate::config::ViewportConfig;
use crate::dispatch::{OutcomeSender, RenderDispatch, RenderJob, RenderOutcome, WorkerPool};
use crate::document::{
    Document, DocumentSource, PdfiumDocument, PixelBuffer, RenderFlags, RenderRequest,
};
use crate::error::{ConfigError, DocumentError, ExportError, RenderError};
use crate::export::ExportJob;
use crate::frames::{FrameSet, PageSlot, Ticket};
use crate::kinetic::{InertiaId, InertiaStep, KineticPhase, KineticScroller, Point};
use crate::layout::{compute_page_layout, DisplayMode, LayoutParams, PixelSize, ZoomMode};
use crate::navigation::{clamp_page, step_page};
use crate::rotation::Rotation;
use crate::scroll::{visible_window, Orientation, ScrollAction, ScrollArea};
use crate::zoom::ZoomState;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};

/// Notifications for the host, drained with [`Viewport::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PageChanged(usize),
    Clicked,
    RenderFailed { page: usize, error: RenderError },
}

/// What the mouse wheel does outside of kinetic dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WheelMode {
    #[default]
    Pan,
    Zoom,
}

pub struct Viewport {
    document: Option<Arc<dyn Document>>,
    page_count: usize,
    current_page: usize,
    zoom: ZoomState,
    rotation: Rotation,
    display_mode: DisplayMode,
    dpi: f32,
    flags: RenderFlags,
    right_to_left: bool,
    wheel_mode: WheelMode,
    scrollbar_reserve: f64,
    frame_space: f64,
    scroll: ScrollArea,
    frames: FrameSet,
    cache: RenderCache,
    /// Renders that failed, not retried until the next invalidation.
    failed: HashSet<(usize, PixelSize)>,
    kinetic: KineticScroller,
    dispatcher: Box<dyn RenderDispatch>,
    outcome_tx: OutcomeSender,
    outcome_rx: UnboundedReceiver<RenderOutcome>,
    next_ticket: Ticket,
    events: VecDeque<ViewerEvent>,
}

impl Viewport {
    /// A viewport rendering on a pool of `config.render_workers` threads.
    pub fn new(config: ViewportConfig) -> Result<Self, ConfigError> {
        let pool = WorkerPool::new(config.render_workers);
        Self::with_dispatcher(config, Box::new(pool))
    }

    pub fn with_dispatcher(
        config: ViewportConfig,
        dispatcher: Box<dyn RenderDispatch>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (outcome_tx, outcome_rx) = unbounded_channel();
        Ok(Self {
            document: None,
            page_count: 0,
            current_page: 0,
            zoom: config.zoom_state(),
            rotation: Rotation::default(),
            display_mode: config.display_mode,
            dpi: config.dpi,
            flags: config.render_flags,
            right_to_left: config.right_to_left,
            wheel_mode: WheelMode::default(),
            scrollbar_reserve: config.scrollbar_reserve,
            frame_space: config.frame_space,
            scroll: ScrollArea::default(),
            frames: FrameSet::default(),
            cache: RenderCache::new(),
            failed: HashSet::new(),
            kinetic: KineticScroller::new(&config.kinetic),
            dispatcher,
            outcome_tx,
            outcome_rx,
            next_ticket: 0,
            events: VecDeque::new(),
        })
    }

    // ---- document lifecycle ----

    /// Open a PDF through pdfium, replacing any loaded document. On failure
    /// the viewport is left unloaded.
    pub fn open_pdf(
        &mut self,
        source: impl Into<DocumentSource>,
        password: Option<&str>,
    ) -> Result<(), DocumentError> {
        self.unload();
        let document = PdfiumDocument::open(source.into(), password)?;
        self.load_document(Arc::new(document));
        Ok(())
    }

    /// Show an already opened document, releasing the previous one first.
    pub fn load_document(&mut self, document: Arc<dyn Document>) {
        self.unload();
        self.page_count = document.page_count();
        self.document = Some(document);
        self.current_page = 0;
        self.frames.reallocate(self.display_mode, self.page_count);
        info!(pages = self.page_count, mode = ?self.display_mode, "document loaded");
        if self.page_count > 0 {
            self.events.push_back(ViewerEvent::PageChanged(0));
            self.show_page(0);
        }
    }

    pub fn unload(&mut self) {
        if self.document.take().is_none() {
            return;
        }
        self.frames.clear();
        self.cache.invalidate_all();
        self.failed.clear();
        while self.outcome_rx.try_recv().is_ok() {}
        self.page_count = 0;
        self.current_page = 0;
        self.scroll.set_extent(0.0, 0.0);
        self.scroll.set_offset(0.0, 0.0);
        info!("document unloaded");
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    // ---- geometry ----

    /// The area was measured or resized.
    pub fn resize(&mut self, width: f64, height: f64) {
        if width == self.scroll.viewport_width() && height == self.scroll.viewport_height() {
            return;
        }
        debug!(width, height, "viewport resized");
        self.scroll.set_viewport(width, height);
        self.relayout();
    }

    fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            viewport_width: self.scroll.viewport_width(),
            viewport_height: self.scroll.viewport_height(),
            scrollbar_reserve: self.scrollbar_reserve,
            rotation: self.rotation,
            zoom_mode: self.zoom.mode(),
            display_mode: self.display_mode,
            zoom: self.zoom.value(),
            zoom_min: self.zoom.min(),
            zoom_max: self.zoom.max(),
        }
    }

    /// Recompute slot sizes and the content extent. Returns false while the
    /// layout is deferred.
    fn layout_slots(&mut self) -> bool {
        let Some(document) = self.document.clone() else {
            return false;
        };
        if !self.scroll.is_measured() {
            debug!("layout deferred until the viewport is measured");
            return false;
        }

        let params = self.layout_params();
        let mut fit_zoom = None;
        for index in 0..self.frames.len() {
            let Some(page) = self.frames.get(index).and_then(PageSlot::page) else {
                self.frames.set_size(index, PixelSize::ZERO);
                continue;
            };
            let layout = document
                .page_size(page)
                .and_then(|intrinsic| compute_page_layout(intrinsic, &params));
            if page == self.current_page {
                fit_zoom = layout.map(|layout| layout.zoom);
            }
            self.frames
                .set_size(index, layout.map_or(PixelSize::ZERO, |layout| layout.size));
        }
        if let Some(zoom) = fit_zoom {
            self.zoom.apply_fit(zoom);
        }

        let (width, height) = self.frames.extent(self.frame_space);
        self.scroll.set_extent(width, height);
        true
    }

    /// Relayout keeping cached bitmaps whose size still fits their slot.
    fn relayout(&mut self) {
        if !self.layout_slots() {
            return;
        }
        let frames = &self.frames;
        self.cache
            .retain_matching(|page| frames.slot_of(page).and_then(|i| frames.get(i)).map(PageSlot::size));
        self.refresh_visible();
    }

    /// Drop every cached bitmap and in-flight render, then relayout.
    fn invalidate_and_relayout(&mut self) {
        self.cache.invalidate_all();
        self.failed.clear();
        self.frames.cancel_all_pending();
        if self.layout_slots() {
            self.refresh_visible();
        }
    }

    fn refresh_visible(&mut self) {
        if self.display_mode == DisplayMode::Continuous {
            self.scroll_to_page(self.current_page);
        } else {
            self.populate_spread();
        }
    }

    // ---- rendering ----

    fn request_render(&mut self, slot: usize) {
        let Some(document) = &self.document else {
            return;
        };
        let Some(page_slot) = self.frames.get(slot) else {
            return;
        };
        let Some(page) = page_slot.page() else {
            return;
        };
        let size = page_slot.size();
        if page_slot.is_pending()
            || size.is_empty()
            || self.cache.contains(page, size)
            || self.failed.contains(&(page, size))
        {
            return;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let job = RenderJob {
            ticket,
            slot,
            request: RenderRequest {
                page,
                size,
                dpi_x: self.dpi,
                dpi_y: self.dpi,
                rotation: self.rotation,
                flags: self.flags,
            },
            document: Arc::clone(document),
        };
        self.frames.set_pending(slot, ticket);
        debug!(page, ticket, width = size.width, height = size.height, "render requested");
        self.dispatcher.dispatch(job, &self.outcome_tx);
    }

    /// Install finished renders that still match their slot. Returns the number
    /// of bitmaps installed.
    pub fn poll_renders(&mut self) -> usize {
        let mut installed = 0;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            if self.install(outcome) {
                installed += 1;
            }
        }
        installed
    }

    fn install(&mut self, outcome: RenderOutcome) -> bool {
        let current = self
            .frames
            .get(outcome.slot)
            .is_some_and(|slot| slot.page() == Some(outcome.page) && slot.size() == outcome.size);
        if !current || !self.frames.complete(outcome.slot, outcome.ticket) {
            debug!(page = outcome.page, ticket = outcome.ticket, "discarding stale render");
            return false;
        }

        match outcome.result {
            Ok(bitmap) => {
                self.cache.insert(outcome.page, bitmap);
                true
            }
            Err(error) => {
                warn!(page = outcome.page, %error, "page render failed");
                self.failed.insert((outcome.page, outcome.size));
                self.events.push_back(ViewerEvent::RenderFailed {
                    page: outcome.page,
                    error,
                });
                false
            }
        }
    }

    pub fn has_pending_renders(&self) -> bool {
        self.frames.iter().any(PageSlot::is_pending)
    }

    // ---- navigation ----

    pub fn goto_page(&mut self, page: usize) {
        if self.document.is_none() || self.page_count == 0 {
            return;
        }
        let page = clamp_page(page, self.page_count);
        self.show_page(page);
        self.set_current_page(page);
    }

    pub fn next_page(&mut self) -> bool {
        self.step(true)
    }

    pub fn previous_page(&mut self) -> bool {
        self.step(false)
    }

    fn step(&mut self, forward: bool) -> bool {
        match step_page(self.current_page, forward, self.display_mode, self.page_count) {
            Some(page) => {
                self.goto_page(page);
                true
            }
            None => false,
        }
    }

    fn show_page(&mut self, page: usize) {
        if self.page_count == 0 {
            return;
        }
        self.set_current_page(page);
        if self.display_mode == DisplayMode::Continuous {
            self.layout_slots();
            self.scroll_to_page(page);
            return;
        }

        self.frames.assign(0, Some(page));
        if self.display_mode == DisplayMode::Book {
            let facing = page + 1;
            self.frames
                .assign(1, (facing < self.page_count).then_some(facing));
        }
        self.scroll.set_offset(0.0, 0.0);
        if self.layout_slots() {
            self.populate_spread();
        }
    }

    /// Keep the cache to the assigned pages and render what is missing.
    fn populate_spread(&mut self) {
        let Some((low, high)) = self.frames.assigned_range() else {
            return;
        };
        self.cache.evict_outside(low, high);
        self.frames.cancel_pending_outside(low, high);
        for slot in 0..self.frames.len() {
            self.request_render(slot);
        }
    }

    fn scroll_to_page(&mut self, page: usize) {
        let top = self.frames.frame_top(page, self.frame_space);
        self.scroll.set_vertical_offset(top);
        self.scan_window();
        self.set_current_page(page);
    }

    /// Derive the visible window from the scroll offset, evict everything
    /// outside it and request what is missing inside it. Returns the first
    /// visible page.
    fn scan_window(&mut self) -> Option<usize> {
        if self.display_mode != DisplayMode::Continuous || self.document.is_none() {
            return None;
        }
        // Page 0 stands in for every page's height.
        let representative = self.frames.get(0)?.size().height as f64;
        let (start, end) = visible_window(
            self.scroll.vertical_offset(),
            self.scroll.viewport_height(),
            representative,
            2.0 * self.frame_space,
            self.page_count,
        )?;

        self.cache.evict_outside(start, end);
        self.frames.cancel_pending_outside(start, end);
        for page in start..=end {
            self.request_render(page);
        }
        debug!(start, end, "visible window updated");
        Some(start)
    }

    fn set_current_page(&mut self, page: usize) {
        if page != self.current_page {
            self.current_page = page;
            self.events.push_back(ViewerEvent::PageChanged(page));
        }
    }

    // ---- scrolling ----

    /// Scroll to an absolute offset, as the host's scrollbars report it. An
    /// offset that does not move the view changes nothing.
    pub fn set_scroll_offset(&mut self, x: f64, y: f64) {
        if !self.scroll.set_offset(x, y) {
            return;
        }
        if let Some(start) = self.scan_window() {
            self.set_current_page(start);
        }
    }

    pub fn perform_scroll(&mut self, action: ScrollAction, orientation: Orientation) {
        if self.scroll.perform_scroll(action, orientation) {
            if let Some(start) = self.scan_window() {
                self.set_current_page(start);
            }
        }
    }

    pub fn set_wheel_mode(&mut self, mode: WheelMode) {
        self.wheel_mode = mode;
    }

    /// Record wheel input that the host scrolled by itself.
    pub fn note_wheel(&mut self, now: Instant) {
        self.kinetic.note_wheel(now);
    }

    /// Handle one wheel notch. Positive `delta` means away from the user.
    pub fn on_wheel(&mut self, delta: f64, now: Instant) {
        self.kinetic.note_wheel(now);
        if self.document.is_none() || !self.scroll.is_measured() || delta == 0.0 {
            return;
        }
        if self.wheel_mode == WheelMode::Zoom {
            if delta > 0.0 {
                self.zoom_in();
            } else {
                self.zoom_out();
            }
            return;
        }
        if self.display_mode == DisplayMode::Continuous {
            let offset = self.scroll.vertical_offset() - delta;
            self.set_scroll_offset(self.scroll.horizontal_offset(), offset);
            return;
        }

        let step = self.display_mode.page_step();
        let page_height = self.frames.get(0).map_or(0.0, |slot| slot.size().height as f64);
        if self.scroll.viewport_height() > page_height {
            if delta > 0.0 {
                self.previous_page();
            } else {
                self.next_page();
            }
        } else if delta < 0.0
            && self.scroll.at_bottom()
            && self.current_page + step < self.page_count
        {
            self.next_page();
            self.scroll.set_vertical_offset(0.0);
        } else if delta > 0.0 && self.scroll.at_top() && self.current_page > 0 {
            self.previous_page();
            self.scroll.set_vertical_offset(self.scroll.scrollable_height());
        } else {
            let offset = self.scroll.vertical_offset() - delta;
            self.scroll.set_vertical_offset(offset);
        }
    }

    // ---- kinetic dragging ----

    pub fn enable_kinetic(&mut self, enabled: bool) {
        self.kinetic.set_enabled(enabled);
    }

    pub fn kinetic_enabled(&self) -> bool {
        self.kinetic.is_enabled()
    }

    pub fn kinetic_phase(&self) -> KineticPhase {
        self.kinetic.phase()
    }

    pub fn begin_drag(&mut self, point: Point) -> bool {
        let offset = Point::new(self.scroll.horizontal_offset(), self.scroll.vertical_offset());
        self.kinetic.begin_drag(point, offset)
    }

    pub fn drag_to(&mut self, point: Point) {
        if let Some(target) = self.kinetic.drag_to(point, self.scroll.scrollable_height()) {
            self.set_scroll_offset(target.x, target.y);
        }
    }

    /// Release the drag. When inertia starts, returns its loop id and the
    /// delay before the first tick.
    pub fn end_drag(&mut self) -> Option<(InertiaId, Duration)> {
        let id = self.kinetic.release()?;
        Some((id, self.kinetic.tick_interval()))
    }

    /// Advance inertia loop `id` by one tick. Returns the delay before the next
    /// tick, or `None` once that loop is over or has been superseded.
    pub fn inertia_tick(&mut self, id: InertiaId, now: Instant) -> Option<Duration> {
        match self.kinetic.tick(id, now) {
            InertiaStep::Continue { target, next_in } => {
                self.set_scroll_offset(target.x, target.y);
                Some(next_in)
            }
            InertiaStep::Finished => None,
        }
    }

    pub fn click(&mut self) {
        self.events.push_back(ViewerEvent::Clicked);
    }

    // ---- zoom ----

    pub fn set_zoom(&mut self, zoom: f64) {
        let changed = self.zoom.set(zoom);
        self.zoom_changed(changed);
    }

    pub fn zoom_in(&mut self) {
        let changed = self.zoom.zoom_in();
        self.zoom_changed(changed);
    }

    pub fn zoom_out(&mut self) {
        let changed = self.zoom.zoom_out();
        self.zoom_changed(changed);
    }

    fn zoom_changed(&mut self, changed: bool) {
        if changed {
            debug!(zoom = self.zoom.value(), "zoom changed");
            self.invalidate_and_relayout();
        }
    }

    pub fn set_zoom_mode(&mut self, mode: ZoomMode) {
        self.zoom.set_mode(mode);
        self.invalidate_and_relayout();
    }

    // ---- rotation and render parameters ----

    pub fn rotate_clockwise(&mut self) {
        self.set_rotation(self.rotation.clockwise());
    }

    pub fn rotate_counterclockwise(&mut self) {
        self.set_rotation(self.rotation.counterclockwise());
    }

    fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        debug!(degrees = rotation.degrees(), "rotation changed");
        self.invalidate_and_relayout();
    }

    pub fn set_dpi(&mut self, dpi: f32) {
        if dpi > 0.0 && dpi != self.dpi {
            self.dpi = dpi;
            self.invalidate_and_relayout();
        }
    }

    pub fn set_render_flags(&mut self, flags: RenderFlags) {
        if flags != self.flags {
            self.flags = flags;
            self.invalidate_and_relayout();
        }
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        if mode == self.display_mode {
            return;
        }
        info!(?mode, "display mode changed");
        self.display_mode = mode;
        self.cache.invalidate_all();
        self.failed.clear();
        if self.document.is_some() {
            self.frames.reallocate(mode, self.page_count);
            self.scroll.set_offset(0.0, 0.0);
            self.show_page(self.current_page);
        }
    }

    pub fn set_right_to_left(&mut self, right_to_left: bool) {
        self.right_to_left = right_to_left;
    }

    // ---- export ----

    /// Capture the current render parameters for every page.
    pub fn export_job(&self) -> Result<ExportJob, ExportError> {
        let document = self.document.clone().ok_or(ExportError::NoDocument)?;
        let params = self.layout_params();
        let requests = (0..self.page_count)
            .map(|page| RenderRequest {
                page,
                size: document
                    .page_size(page)
                    .and_then(|intrinsic| compute_page_layout(intrinsic, &params))
                    .map_or(PixelSize::ZERO, |layout| layout.size),
                dpi_x: self.dpi,
                dpi_y: self.dpi,
                rotation: self.rotation,
                flags: self.flags,
            })
            .collect();
        Ok(ExportJob { document, requests })
    }

    // ---- accessors ----

    pub fn drain_events(&mut self) -> impl Iterator<Item = ViewerEvent> + '_ {
        self.events.drain(..)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn zoom(&self) -> f64 {
        self.zoom.value()
    }

    pub fn zoom_mode(&self) -> ZoomMode {
        self.zoom.mode()
    }

    pub fn zoom_bounds(&self) -> (f64, f64) {
        (self.zoom.min(), self.zoom.max())
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    pub fn render_flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn right_to_left(&self) -> bool {
        self.right_to_left
    }

    pub fn wheel_mode(&self) -> WheelMode {
        self.wheel_mode
    }

    pub fn frame_space(&self) -> f64 {
        self.frame_space
    }

    pub fn scroll(&self) -> &ScrollArea {
        &self.scroll
    }

    pub fn frames(&self) -> &FrameSet {
        &self.frames
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Slot indices in on-screen order, reversed for right-to-left spreads.
    pub fn display_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.frames.len()).collect();
        if self.right_to_left && self.display_mode != DisplayMode::Continuous {
            order.reverse();
        }
        order
    }

    /// The bitmap currently shown in `slot`, if its page has been rendered.
    pub fn slot_bitmap(&self, slot: usize) -> Option<&PixelBuffer> {
        let page = self.frames.get(slot)?.page()?;
        self.cache.get(page).map(|entry| &entry.bitmap)
    }
}
