use anyhow::Context;
use clap::{Parser, ValueEnum};
use iced::widget::image::Handle;
use iced::widget::scrollable::AbsoluteOffset;
use iced::widget::{
    button, column, container, horizontal_space, image as img, mouse_area, row, scrollable,
    text, Column, Row, Space,
};
use iced::{event, keyboard, mouse, window, Element, Event, Length, Size, Subscription, Task, Theme};
use pdf_viewport::{
    render_all_pages, CancellationToken, DisplayMode, Document, DocumentError, DocumentSource,
    InertiaId, KineticConfig, KineticPhase, Orientation, PdfiumDocument, PixelSize, Point,
    ScrollAction, ViewerEvent, Viewport, ViewportConfig, WheelMode, ZoomMode,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WINDOW_SIZE: (f32, f32) = (1100.0, 850.0);
const TOOLBAR_HEIGHT: f32 = 52.0;
const WHEEL_LINE: f32 = 40.0;
const POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "pdf-viewport", version, about = "View a PDF document")]
struct Args {
    /// PDF file to open
    path: PathBuf,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,

    /// Initial page arrangement
    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,

    /// Drag to scroll with inertia
    #[arg(long)]
    kinetic: bool,

    /// Render worker threads
    #[arg(long, default_value_t = 2)]
    workers: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Single,
    Book,
    Continuous,
}

impl From<Mode> for DisplayMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => DisplayMode::Single,
            Mode::Book => DisplayMode::Book,
            Mode::Continuous => DisplayMode::Continuous,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("pdf_viewport=debug,info")
        .init();

    let args = Args::parse();
    let config = ViewportConfig {
        display_mode: args.mode.into(),
        render_workers: args.workers,
        kinetic: KineticConfig {
            enabled: args.kinetic,
            ..KineticConfig::default()
        },
        ..ViewportConfig::default()
    };
    let viewport = Viewport::new(config).context("invalid viewport settings")?;

    iced::application("PDF Viewport", Viewer::update, Viewer::view)
        .theme(|_| Theme::Dark)
        .subscription(Viewer::subscription)
        .window_size(WINDOW_SIZE)
        .run_with(move || Viewer::new(args, viewport))
        .context("viewer window failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
enum Message {
    Opened(Result<Arc<PdfiumDocument>, DocumentError>),
    WindowResized(Size),
    Scrolled(AbsoluteOffset),
    Wheel(f32),
    Modifiers(keyboard::Modifiers),
    Scroll(ScrollAction, Orientation),
    CursorMoved(iced::Point),
    Pressed,
    Released,
    InertiaTick(InertiaId),
    Poll,
    NextPage,
    PreviousPage,
    ZoomIn,
    ZoomOut,
    ZoomMode(ZoomMode),
    RotateClockwise,
    RotateCounterclockwise,
    DisplayMode(DisplayMode),
    ToggleKinetic,
    Export,
    CancelExport,
    Exported(Result<usize, String>),
}

struct Viewer {
    viewport: Viewport,
    file_name: String,
    status: String,
    handles: HashMap<usize, (PixelSize, Handle)>,
    scroll_id: scrollable::Id,
    shown_offset: (f64, f64),
    cursor: Point,
    export: Option<CancellationToken>,
}

impl Viewer {
    fn new(args: Args, mut viewport: Viewport) -> (Self, Task<Message>) {
        viewport.resize(
            WINDOW_SIZE.0 as f64,
            (WINDOW_SIZE.1 - TOOLBAR_HEIGHT) as f64,
        );
        let file_name = args
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("Untitled")
            .to_string();
        let source = DocumentSource::Path(args.path);
        let password = args.password;

        let open = Task::perform(
            async move {
                tokio::task::spawn_blocking(move || {
                    PdfiumDocument::open(source, password.as_deref()).map(Arc::new)
                })
                .await
                .unwrap_or_else(|e| Err(DocumentError::Library(e.to_string())))
            },
            Message::Opened,
        );

        (
            Self {
                viewport,
                file_name,
                status: "Opening...".to_string(),
                handles: HashMap::new(),
                scroll_id: scrollable::Id::new("pages"),
                shown_offset: (0.0, 0.0),
                cursor: Point::default(),
                export: None,
            },
            open,
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::Opened(Ok(document)) => {
                let document: Arc<dyn Document> = document;
                self.viewport.load_document(document);
                self.status.clear();
                Task::none()
            }
            Message::Opened(Err(e)) => {
                tracing::error!("Failed to open PDF: {}", e);
                self.status = format!("Could not open {}: {e}", self.file_name);
                Task::none()
            }
            Message::WindowResized(size) => {
                self.viewport.resize(
                    size.width as f64,
                    (size.height - TOOLBAR_HEIGHT).max(0.0) as f64,
                );
                Task::none()
            }
            Message::Scrolled(offset) => {
                let offset = (offset.x as f64, offset.y as f64);
                // Echo of a position the viewport chose itself.
                if offset != self.shown_offset {
                    self.shown_offset = offset;
                    self.viewport.set_scroll_offset(offset.0, offset.1);
                }
                Task::none()
            }
            Message::Wheel(delta) => {
                // The scroll area pans continuous pages by itself.
                if self.viewport.display_mode() == DisplayMode::Continuous
                    && self.viewport.wheel_mode() == WheelMode::Pan
                {
                    self.viewport.note_wheel(Instant::now());
                } else {
                    self.viewport.on_wheel(delta as f64, Instant::now());
                }
                Task::none()
            }
            Message::Modifiers(modifiers) => {
                self.viewport.set_wheel_mode(if modifiers.control() {
                    WheelMode::Zoom
                } else {
                    WheelMode::Pan
                });
                Task::none()
            }
            Message::Scroll(action, orientation) => {
                self.viewport.perform_scroll(action, orientation);
                Task::none()
            }
            Message::CursorMoved(position) => {
                self.cursor = Point::new(position.x as f64, position.y as f64);
                if self.viewport.kinetic_phase() == KineticPhase::Dragging {
                    self.viewport.drag_to(self.cursor);
                }
                Task::none()
            }
            Message::Pressed => {
                self.viewport.click();
                self.viewport.begin_drag(self.cursor);
                Task::none()
            }
            Message::Released => match self.viewport.end_drag() {
                Some((id, delay)) => inertia_after(id, delay),
                None => Task::none(),
            },
            Message::InertiaTick(id) => match self.viewport.inertia_tick(id, Instant::now()) {
                Some(delay) => inertia_after(id, delay),
                None => Task::none(),
            },
            Message::Poll => {
                self.viewport.poll_renders();
                Task::none()
            }
            Message::NextPage => {
                self.viewport.next_page();
                Task::none()
            }
            Message::PreviousPage => {
                self.viewport.previous_page();
                Task::none()
            }
            Message::ZoomIn => {
                self.viewport.zoom_in();
                Task::none()
            }
            Message::ZoomOut => {
                self.viewport.zoom_out();
                Task::none()
            }
            Message::ZoomMode(mode) => {
                self.viewport.set_zoom_mode(mode);
                Task::none()
            }
            Message::RotateClockwise => {
                self.viewport.rotate_clockwise();
                Task::none()
            }
            Message::RotateCounterclockwise => {
                self.viewport.rotate_counterclockwise();
                Task::none()
            }
            Message::DisplayMode(mode) => {
                self.viewport.set_display_mode(mode);
                Task::none()
            }
            Message::ToggleKinetic => {
                let enabled = !self.viewport.kinetic_enabled();
                self.viewport.enable_kinetic(enabled);
                Task::none()
            }
            Message::Export => self.start_export(),
            Message::CancelExport => {
                if let Some(token) = &self.export {
                    token.cancel();
                }
                Task::none()
            }
            Message::Exported(result) => {
                self.export = None;
                self.status = match result {
                    Ok(pages) => format!("Rendered {pages} page(s)"),
                    Err(e) => e,
                };
                Task::none()
            }
        };

        self.handle_events();
        self.refresh_handles();
        Task::batch([task, self.sync_scroll()])
    }

    fn start_export(&mut self) -> Task<Message> {
        if self.export.is_some() {
            return Task::none();
        }
        let job = match self.viewport.export_job() {
            Ok(job) => job,
            Err(e) => {
                self.status = e.to_string();
                return Task::none();
            }
        };
        let token = CancellationToken::new();
        self.export = Some(token.clone());
        self.status = format!("Rendering {} page(s)...", job.page_count());
        Task::perform(render_all_pages(job, token), |result| {
            Message::Exported(result.map(|pages| pages.len()).map_err(|e| e.to_string()))
        })
    }

    fn handle_events(&mut self) {
        let events: Vec<ViewerEvent> = self.viewport.drain_events().collect();
        for event in events {
            match event {
                ViewerEvent::PageChanged(page) => tracing::debug!(page, "page changed"),
                ViewerEvent::Clicked => tracing::trace!("viewport clicked"),
                ViewerEvent::RenderFailed { page, error } => {
                    self.status = format!("Page {} failed to render: {error}", page + 1);
                }
            }
        }
    }

    /// Mirror the render cache into image handles.
    fn refresh_handles(&mut self) {
        let cache = self.viewport.cache();
        self.handles
            .retain(|&page, (size, _)| cache.contains(page, *size));
        for page in cache.cached_pages() {
            if self.handles.contains_key(&page) {
                continue;
            }
            if let Some(entry) = cache.get(page) {
                let handle = Handle::from_rgba(
                    entry.size.width,
                    entry.size.height,
                    entry.bitmap.as_raw().to_vec(),
                );
                self.handles.insert(page, (entry.size, handle));
            }
        }
    }

    /// Move the scroll area wherever the viewport moved itself.
    fn sync_scroll(&mut self) -> Task<Message> {
        let scroll = self.viewport.scroll();
        let offset = (scroll.horizontal_offset(), scroll.vertical_offset());
        if offset == self.shown_offset {
            return Task::none();
        }
        self.shown_offset = offset;
        scrollable::scroll_to(
            self.scroll_id.clone(),
            AbsoluteOffset {
                x: offset.0 as f32,
                y: offset.1 as f32,
            },
        )
    }

    fn subscription(&self) -> Subscription<Message> {
        let input = event::listen_with(input_message);
        if self.viewport.has_pending_renders() {
            Subscription::batch([
                input,
                iced::time::every(POLL_INTERVAL).map(|_| Message::Poll),
            ])
        } else {
            input
        }
    }

    fn view(&self) -> Element<Message> {
        let vp = &self.viewport;
        let toolbar = row![
            button("◀").on_press(Message::PreviousPage),
            text(if vp.is_loaded() {
                format!("Page {} of {}", vp.current_page() + 1, vp.page_count())
            } else {
                self.file_name.clone()
            }),
            button("▶").on_press(Message::NextPage),
            horizontal_space(),
            button("−").on_press(Message::ZoomOut),
            text(format!("{}%", (vp.zoom() * 100.0).round() as i32)),
            button("+").on_press(Message::ZoomIn),
            button("Width").on_press(Message::ZoomMode(ZoomMode::FitWidth)),
            button("Height").on_press(Message::ZoomMode(ZoomMode::FitHeight)),
            button("⟲").on_press(Message::RotateCounterclockwise),
            button("⟳").on_press(Message::RotateClockwise),
            horizontal_space(),
            button("Single").on_press(Message::DisplayMode(DisplayMode::Single)),
            button("Book").on_press(Message::DisplayMode(DisplayMode::Book)),
            button("Continuous").on_press(Message::DisplayMode(DisplayMode::Continuous)),
            button(if vp.kinetic_enabled() { "Drag: on" } else { "Drag: off" })
                .on_press(Message::ToggleKinetic),
            if self.export.is_some() {
                button("Cancel").on_press(Message::CancelExport)
            } else {
                button("Export").on_press(Message::Export)
            },
        ]
        .spacing(8)
        .padding(8)
        .height(TOOLBAR_HEIGHT);

        let frames = vp.display_order().into_iter().map(|slot| self.frame(slot));
        let pages: Element<Message> = if vp.display_mode() == DisplayMode::Continuous {
            Column::with_children(frames).into()
        } else {
            Row::with_children(frames).into()
        };

        let area = scrollable(pages)
            .id(self.scroll_id.clone())
            .direction(scrollable::Direction::Both {
                vertical: scrollable::Scrollbar::new(),
                horizontal: scrollable::Scrollbar::new(),
            })
            .on_scroll(|viewport| Message::Scrolled(viewport.absolute_offset()))
            .width(Length::Fill)
            .height(Length::Fill);

        let area = mouse_area(area)
            .on_press(Message::Pressed)
            .on_release(Message::Released)
            .on_move(Message::CursorMoved);

        let mut layout = column![toolbar, area];
        if !self.status.is_empty() {
            layout = layout.push(text(&self.status).size(14));
        }
        layout.into()
    }

    fn frame(&self, slot: usize) -> Element<Message> {
        let frame = self.viewport.frames().get(slot);
        let size = frame.map_or(PixelSize::ZERO, |frame| frame.size());
        let (width, height) = (size.width as f32, size.height as f32);
        let content: Element<Message> = match frame
            .and_then(|frame| frame.page())
            .and_then(|page| self.handles.get(&page))
        {
            Some((_, handle)) => img(handle.clone()).width(width).height(height).into(),
            None => Space::new(width, height).into(),
        };
        container(content)
            .padding(self.viewport.frame_space() as f32)
            .into()
    }
}

fn inertia_after(id: InertiaId, delay: Duration) -> Task<Message> {
    Task::perform(tokio::time::sleep(delay), move |_| Message::InertiaTick(id))
}

fn input_message(event: Event, status: event::Status, _window: window::Id) -> Option<Message> {
    match event {
        Event::Window(window::Event::Resized(size)) => Some(Message::WindowResized(size)),
        Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
            let dy = match delta {
                mouse::ScrollDelta::Lines { y, .. } => y * WHEEL_LINE,
                mouse::ScrollDelta::Pixels { y, .. } => y,
            };
            Some(Message::Wheel(dy))
        }
        Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
            Some(Message::Modifiers(modifiers))
        }
        Event::Keyboard(keyboard::Event::KeyPressed { key, modifiers, .. })
            if status == event::Status::Ignored =>
        {
            key_message(key.as_ref(), modifiers)
        }
        _ => None,
    }
}

fn key_message(key: keyboard::Key<&str>, modifiers: keyboard::Modifiers) -> Option<Message> {
    use keyboard::key::Named;
    use Orientation::{Horizontal, Vertical};

    let scroll = |action, orientation| Some(Message::Scroll(action, orientation));
    match key {
        keyboard::Key::Named(Named::ArrowUp) => scroll(ScrollAction::LineUp, Vertical),
        keyboard::Key::Named(Named::ArrowDown) => scroll(ScrollAction::LineDown, Vertical),
        keyboard::Key::Named(Named::ArrowLeft) => scroll(ScrollAction::LineUp, Horizontal),
        keyboard::Key::Named(Named::ArrowRight) => scroll(ScrollAction::LineDown, Horizontal),
        keyboard::Key::Named(Named::PageUp) => scroll(ScrollAction::PageUp, Vertical),
        keyboard::Key::Named(Named::PageDown) => scroll(ScrollAction::PageDown, Vertical),
        keyboard::Key::Named(Named::Home) => scroll(ScrollAction::Home, Vertical),
        keyboard::Key::Named(Named::End) => scroll(ScrollAction::End, Vertical),
        keyboard::Key::Character("+" | "=") if modifiers.control() => Some(Message::ZoomIn),
        keyboard::Key::Character("-") if modifiers.control() => Some(Message::ZoomOut),
        _ => None,
    }
}
