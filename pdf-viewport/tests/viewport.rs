mod common;

use common::{explicit_config, loaded, loaded_manual, FakeDocument, ManualDispatch};
use pdf_viewport::{
    DisplayMode, DocumentError, InlineDispatch, KineticConfig, KineticPhase, Orientation,
    PixelSize, Point, RenderError, RenderFlags, RenderRequest, Rotation, ScrollAction,
    ViewerEvent, Viewport, ViewportConfig, ZoomMode,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn continuous_window_holds_exactly_the_visible_pages() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    // 200 px pages on a 210 px pitch, 300 px viewport.
    assert_eq!(vp.cache().cached_pages(), vec![0, 1]);

    vp.set_scroll_offset(0.0, 800.0);
    vp.poll_renders();
    assert_eq!(vp.current_page(), 3);
    assert_eq!(vp.cache().cached_pages(), vec![3, 4, 5]);
    for absent in [0, 1, 2, 6, 7, 8, 9] {
        assert!(vp.cache().get(absent).is_none(), "page {absent} still cached");
    }

    vp.set_scroll_offset(0.0, 0.0);
    vp.poll_renders();
    assert_eq!(vp.cache().cached_pages(), vec![0, 1]);
}

#[test]
fn eviction_happens_before_results_arrive() {
    let (mut vp, dispatch) = loaded_manual(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    for (job, outcomes) in dispatch.take() {
        outcomes.send(job.execute()).unwrap();
    }
    vp.poll_renders();
    assert_eq!(vp.cache().cached_pages(), vec![0, 1]);

    vp.set_scroll_offset(0.0, 800.0);
    assert!(vp.cache().is_empty());
    assert_eq!(dispatch.queued(), 3);
}

#[test]
fn book_goto_shows_the_facing_pair() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Book),
        Arc::new(FakeDocument::letter(10)),
    );
    vp.goto_page(4);
    vp.poll_renders();

    assert_eq!(vp.frames().get(0).unwrap().page(), Some(4));
    assert_eq!(vp.frames().get(1).unwrap().page(), Some(5));
    assert_eq!(vp.cache().cached_pages(), vec![4, 5]);
    assert!(vp.slot_bitmap(0).is_some());
    assert!(vp.slot_bitmap(1).is_some());
}

#[test]
fn book_goto_last_page_leaves_second_slot_empty() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Book),
        Arc::new(FakeDocument::letter(5)),
    );
    vp.goto_page(4);
    vp.poll_renders();
    assert_eq!(vp.frames().get(1).unwrap().page(), None);
    assert_eq!(vp.cache().cached_pages(), vec![4]);
}

#[test]
fn zoom_in_stops_at_the_upper_bound() {
    let config = ViewportConfig {
        zoom: 1.0,
        zoom_factor: 1.2,
        zoom_max: 1.1,
        ..explicit_config(DisplayMode::Single)
    };
    let mut vp = loaded(config, Arc::new(FakeDocument::letter(3)));
    assert_eq!(vp.zoom_bounds(), (0.1, 1.1));
    vp.zoom_in();
    assert!((vp.zoom() - 1.1).abs() < 1e-9);
    vp.zoom_in();
    assert!((vp.zoom() - 1.1).abs() < 1e-9);
}

#[test]
fn zoom_change_rerenders_at_the_new_size() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(3)),
    );
    vp.set_zoom(2.0);
    assert!(vp.cache().is_empty());
    vp.poll_renders();
    assert!(vp.cache().contains(0, PixelSize::new(200, 400)));
    assert_eq!(vp.zoom_mode(), ZoomMode::Explicit);
}

#[test]
fn fit_width_follows_the_viewport() {
    let config = ViewportConfig {
        zoom_mode: ZoomMode::FitWidth,
        ..ViewportConfig::default()
    };
    let mut vp = loaded(config, Arc::new(FakeDocument::letter(3)));
    // (400 - 50) / 100
    assert!((vp.zoom() - 3.5).abs() < 1e-9);
    assert_eq!(vp.frames().get(0).unwrap().size(), PixelSize::new(350, 700));

    vp.set_display_mode(DisplayMode::Book);
    assert!((vp.zoom() - 1.75).abs() < 1e-9);
}

#[test]
fn zoom_mode_switch_refits_the_page() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(3)),
    );
    assert!(vp.cache().contains(0, PixelSize::new(100, 200)));

    vp.set_zoom_mode(ZoomMode::FitWidth);
    assert!(vp.cache().is_empty());
    assert!((vp.zoom() - 3.5).abs() < 1e-9);
    vp.poll_renders();
    assert_eq!(vp.cache().cached_pages(), vec![0]);
    assert!(vp.cache().contains(0, PixelSize::new(350, 700)));

    vp.set_zoom_mode(ZoomMode::FitHeight);
    assert!((vp.zoom() - 1.5).abs() < 1e-9);
    vp.poll_renders();
    assert!(vp.cache().contains(0, PixelSize::new(150, 300)));
}

/// Continuous viewport with page 0 installed and page 1 still in flight.
fn half_rendered() -> (Viewport, ManualDispatch) {
    let (mut vp, dispatch) = loaded_manual(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    let mut jobs = dispatch.take();
    assert_eq!(jobs.len(), 2);
    let in_flight = jobs.pop().unwrap();
    let (job, outcomes) = jobs.pop().unwrap();
    outcomes.send(job.execute()).unwrap();
    vp.poll_renders();
    assert_eq!(vp.cache().cached_pages(), vec![0]);

    // Keep holding the page 1 job; it is delivered after the change.
    dispatch.hold(in_flight);
    (vp, dispatch)
}

/// Run every queued job, oldest first, and return the requests they carried.
fn run_all(vp: &mut Viewport, dispatch: &ManualDispatch) -> Vec<RenderRequest> {
    let mut requests = Vec::new();
    for (job, outcomes) in dispatch.take() {
        requests.push(job.request);
        outcomes.send(job.execute()).unwrap();
    }
    vp.poll_renders();
    requests
}

#[test]
fn dpi_change_drops_bitmaps_and_renders_in_flight() {
    let (mut vp, dispatch) = half_rendered();
    vp.set_dpi(144.0);
    assert!(vp.cache().is_empty());
    assert_eq!(vp.dpi(), 144.0);
    // The held page 1 job plus one fresh job per visible page.
    assert_eq!(dispatch.queued(), 3);

    let requests = run_all(&mut vp, &dispatch);
    assert_eq!(requests[0].dpi_x, 96.0);
    assert!(requests[1..].iter().all(|r| r.dpi_x == 144.0 && r.dpi_y == 144.0));
    assert_eq!(vp.cache().cached_pages(), vec![0, 1]);
    assert!(!vp.has_pending_renders());
}

#[test]
fn render_flag_change_drops_bitmaps_and_renders_in_flight() {
    let (mut vp, dispatch) = half_rendered();
    let flags = RenderFlags {
        grayscale: true,
        annotations: true,
        ..RenderFlags::default()
    };
    vp.set_render_flags(flags);
    assert!(vp.cache().is_empty());
    assert_eq!(vp.render_flags(), flags);
    assert_eq!(dispatch.queued(), 3);

    let requests = run_all(&mut vp, &dispatch);
    assert_eq!(requests[0].flags, RenderFlags::default());
    assert!(requests[1..].iter().all(|r| r.flags == flags));
    assert_eq!(vp.cache().cached_pages(), vec![0, 1]);

    // Setting the same flags again keeps the cache.
    vp.set_render_flags(flags);
    assert_eq!(vp.cache().cached_pages(), vec![0, 1]);
    assert_eq!(dispatch.queued(), 0);
}

#[test]
fn navigation_stops_at_both_ends() {
    let mut single = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5)),
    );
    assert!(!single.previous_page());
    assert_eq!(single.current_page(), 0);
    single.goto_page(4);
    assert!(!single.next_page());
    assert_eq!(single.current_page(), 4);
    assert!(single.previous_page());
    assert_eq!(single.current_page(), 3);

    let mut book = loaded(
        explicit_config(DisplayMode::Book),
        Arc::new(FakeDocument::letter(6)),
    );
    assert!(book.next_page());
    assert_eq!(book.current_page(), 2);
    book.goto_page(4);
    assert!(!book.next_page());
    assert_eq!(book.current_page(), 4);
}

#[test]
fn goto_clamps_past_the_end() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5)),
    );
    vp.goto_page(99);
    assert_eq!(vp.current_page(), 4);
}

#[test]
fn page_changes_are_reported_once() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5)),
    );
    let _ = vp.drain_events().count();
    vp.goto_page(2);
    vp.goto_page(2);
    vp.next_page();
    let events: Vec<ViewerEvent> = vp.drain_events().collect();
    assert_eq!(
        events,
        vec![ViewerEvent::PageChanged(2), ViewerEvent::PageChanged(3)]
    );
}

#[test]
fn four_clockwise_turns_return_to_start() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(2)),
    );
    vp.rotate_clockwise();
    assert_eq!(vp.rotation(), Rotation::Rotate90);
    assert!(vp.cache().is_empty());
    vp.poll_renders();
    assert!(vp.cache().contains(0, PixelSize::new(200, 100)));

    for _ in 0..3 {
        vp.rotate_clockwise();
    }
    assert_eq!(vp.rotation(), Rotation::Rotate0);
    vp.rotate_counterclockwise();
    assert_eq!(vp.rotation(), Rotation::Rotate270);
}

#[test]
fn superseded_page_result_is_discarded() {
    let (mut vp, dispatch) = loaded_manual(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5)),
    );
    vp.goto_page(1);
    let mut jobs = dispatch.take();
    assert_eq!(jobs.len(), 2);

    // Deliver newest first; the page 0 result then arrives late.
    jobs.reverse();
    for (job, outcomes) in jobs {
        outcomes.send(job.execute()).unwrap();
    }
    assert_eq!(vp.poll_renders(), 1);
    assert_eq!(vp.cache().cached_pages(), vec![1]);
}

#[test]
fn result_at_an_old_size_is_discarded() {
    let (mut vp, dispatch) = loaded_manual(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5)),
    );
    let old: Vec<_> = dispatch
        .take()
        .into_iter()
        .map(|(job, outcomes)| (job.execute(), outcomes))
        .collect();

    vp.set_zoom(2.0);
    for (outcome, outcomes) in old {
        outcomes.send(outcome).unwrap();
    }
    for (job, outcomes) in dispatch.take() {
        outcomes.send(job.execute()).unwrap();
    }

    assert_eq!(vp.poll_renders(), 1);
    assert!(vp.cache().contains(0, PixelSize::new(200, 400)));
}

#[test]
fn one_render_in_flight_per_slot() {
    let (mut vp, dispatch) = loaded_manual(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5)),
    );
    assert!(vp.has_pending_renders());
    vp.goto_page(0);
    vp.goto_page(0);
    assert_eq!(dispatch.queued(), 1);
}

#[test]
fn render_failure_keeps_the_viewport_usable() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(5).failing_on(2)),
    );
    vp.goto_page(2);
    assert_eq!(vp.poll_renders(), 0);
    assert!(vp.slot_bitmap(0).is_none());
    let failures: Vec<ViewerEvent> = vp
        .drain_events()
        .filter(|event| matches!(event, ViewerEvent::RenderFailed { .. }))
        .collect();
    assert_eq!(
        failures,
        vec![ViewerEvent::RenderFailed {
            page: 2,
            error: RenderError::Backend {
                page: 2,
                message: "corrupt content stream".to_string(),
            },
        }]
    );

    vp.next_page();
    assert_eq!(vp.poll_renders(), 1);
    assert!(vp.slot_bitmap(0).is_some());
}

#[test]
fn deferred_layout_runs_on_first_measure() {
    let document = Arc::new(FakeDocument::letter(3));
    let mut vp = Viewport::with_dispatcher(ViewportConfig::default(), Box::new(InlineDispatch))
        .unwrap();
    vp.load_document(document.clone());
    vp.poll_renders();
    assert_eq!(document.render_count(), 0);
    assert_eq!(vp.frames().get(0).unwrap().size(), PixelSize::ZERO);

    vp.resize(400.0, 300.0);
    vp.poll_renders();
    assert_eq!(document.render_count(), 1);
    assert_eq!(vp.slot_bitmap(0).unwrap().size(), PixelSize::new(150, 300));
}

#[test]
fn resize_keeps_bitmaps_that_still_fit() {
    let document = Arc::new(FakeDocument::letter(3));
    let mut vp = loaded(explicit_config(DisplayMode::Single), document.clone());
    assert_eq!(document.render_count(), 1);
    vp.resize(520.0, 300.0);
    vp.poll_renders();
    assert_eq!(document.render_count(), 1);

    let document = Arc::new(FakeDocument::letter(3));
    let mut fit = loaded(ViewportConfig::default(), document.clone());
    fit.resize(400.0, 400.0);
    fit.poll_renders();
    assert_eq!(document.render_count(), 2);
    assert_eq!(fit.slot_bitmap(0).unwrap().size(), PixelSize::new(200, 400));
}

#[test]
fn reopening_releases_the_previous_document() {
    let first = Arc::new(FakeDocument::letter(4));
    let mut vp = loaded(explicit_config(DisplayMode::Single), first.clone());
    assert_eq!(Arc::strong_count(&first), 2);

    vp.load_document(Arc::new(FakeDocument::letter(2)));
    assert_eq!(Arc::strong_count(&first), 1);
    assert_eq!(vp.page_count(), 2);
    assert_eq!(vp.current_page(), 0);
}

#[test]
fn failed_open_leaves_the_viewport_unloaded() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Single),
        Arc::new(FakeDocument::letter(4)),
    );
    let dir = tempfile::tempdir().unwrap();
    let result = vp.open_pdf(dir.path().join("missing.pdf"), None);

    assert!(matches!(result, Err(DocumentError::NotFound(_))));
    assert!(!vp.is_loaded());
    assert_eq!(vp.page_count(), 0);
    assert!(vp.cache().is_empty());
}

#[test]
fn keyboard_scrolling_updates_the_window() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    vp.perform_scroll(ScrollAction::End, Orientation::Vertical);
    vp.poll_renders();
    assert_eq!(vp.scroll().vertical_offset(), 1800.0);
    assert_eq!(vp.current_page(), 8);
    assert_eq!(vp.cache().cached_pages(), vec![8, 9]);

    vp.perform_scroll(ScrollAction::Home, Orientation::Vertical);
    assert_eq!(vp.current_page(), 0);
}

#[test]
fn continuous_goto_scrolls_to_the_page() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    vp.goto_page(4);
    vp.poll_renders();
    assert_eq!(vp.scroll().vertical_offset(), 840.0);
    assert_eq!(vp.current_page(), 4);
    assert_eq!(vp.cache().cached_pages(), vec![4, 5]);

    // Clamped by the end of the document, the page is still reported.
    vp.goto_page(9);
    assert_eq!(vp.current_page(), 9);
}

#[test]
fn scrolling_to_where_the_view_already_is_keeps_the_page() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    vp.goto_page(9);
    let _ = vp.drain_events().count();

    let offset = vp.scroll().vertical_offset();
    assert_eq!(offset, 1800.0);
    vp.set_scroll_offset(0.0, offset);
    assert_eq!(vp.current_page(), 9);
    assert_eq!(vp.drain_events().count(), 0);

    vp.set_scroll_offset(0.0, offset - 1.0);
    assert_eq!(vp.current_page(), 8);
}

#[test]
fn failing_page_is_not_retried_while_scrolling() {
    let document = Arc::new(FakeDocument::letter(10).failing_on(1));
    let mut vp = loaded(explicit_config(DisplayMode::Continuous), document.clone());
    assert_eq!(document.render_count(), 2);
    let failures = |vp: &mut Viewport| {
        vp.drain_events()
            .filter(|event| matches!(event, ViewerEvent::RenderFailed { page: 1, .. }))
            .count()
    };
    assert_eq!(failures(&mut vp), 1);

    for offset in [10.0, 20.0, 5.0] {
        vp.set_scroll_offset(0.0, offset);
        vp.poll_renders();
    }
    assert_eq!(document.render_count(), 2);
    assert_eq!(failures(&mut vp), 0);
    assert_eq!(vp.cache().cached_pages(), vec![0]);

    // A new render parameter gives the page another chance.
    vp.set_dpi(144.0);
    vp.poll_renders();
    assert_eq!(document.render_count(), 4);
    assert_eq!(failures(&mut vp), 1);
}

#[test]
fn empty_document_shows_nothing() {
    let document = Arc::new(FakeDocument::letter(0));
    let mut vp = loaded(explicit_config(DisplayMode::Single), document.clone());
    assert!(vp.is_loaded());
    assert_eq!(vp.page_count(), 0);
    assert_eq!(vp.drain_events().count(), 0);
    assert_eq!(vp.frames().get(0).unwrap().page(), None);
    assert!(vp.cache().is_empty());

    vp.goto_page(3);
    assert!(!vp.next_page());
    vp.set_display_mode(DisplayMode::Book);
    assert_eq!(vp.current_page(), 0);
    assert_eq!(vp.drain_events().count(), 0);
    assert_eq!(document.render_count(), 0);
}

#[test]
fn wheel_at_the_bottom_turns_the_page() {
    let config = explicit_config(DisplayMode::Single);
    let mut vp = loaded(config, Arc::new(FakeDocument::letter(4)));
    vp.set_zoom(2.0);
    vp.poll_renders();
    // 400 px page plus 10 px framing in a 300 px viewport.
    assert_eq!(vp.scroll().scrollable_height(), 110.0);

    vp.on_wheel(-120.0, Instant::now());
    assert_eq!(vp.current_page(), 0);
    assert_eq!(vp.scroll().vertical_offset(), 110.0);

    vp.on_wheel(-120.0, Instant::now());
    assert_eq!(vp.current_page(), 1);
    assert_eq!(vp.scroll().vertical_offset(), 0.0);

    vp.on_wheel(120.0, Instant::now());
    assert_eq!(vp.current_page(), 0);
    assert_eq!(vp.scroll().vertical_offset(), 110.0);
}

fn kinetic_viewport(friction: f64) -> Viewport {
    let config = ViewportConfig {
        kinetic: KineticConfig {
            enabled: true,
            friction,
            ..KineticConfig::default()
        },
        ..explicit_config(DisplayMode::Continuous)
    };
    loaded(config, Arc::new(FakeDocument::letter(10)))
}

#[test]
fn drag_then_inertia_keeps_scrolling() {
    let mut vp = kinetic_viewport(0.9);
    assert!(vp.begin_drag(Point::new(0.0, 500.0)));
    vp.drag_to(Point::new(0.0, 450.0));
    assert_eq!(vp.scroll().vertical_offset(), 50.0);

    let (id, first_delay) = vp.end_drag().unwrap();
    assert_eq!(first_delay, Duration::from_millis(20));
    assert_eq!(vp.kinetic_phase(), KineticPhase::Inertia);

    let now = Instant::now();
    let mut ticks = 0;
    while vp.inertia_tick(id, now).is_some() {
        ticks += 1;
        assert!(ticks <= 150);
    }
    assert!(ticks > 1);
    assert!(vp.scroll().vertical_offset() > 50.0);
    assert_eq!(vp.kinetic_phase(), KineticPhase::Idle);
    vp.poll_renders();
    assert_eq!(vp.cache().cached_pages().first(), Some(&vp.current_page()));
}

#[test]
fn inertia_ends_within_the_time_cap_with_little_friction() {
    let mut vp = kinetic_viewport(0.999_999);
    vp.begin_drag(Point::new(0.0, 500.0));
    vp.drag_to(Point::new(0.0, 495.0));
    let (id, _) = vp.end_drag().unwrap();

    let now = Instant::now();
    let mut ticks = 0;
    while vp.inertia_tick(id, now).is_some() {
        ticks += 1;
        assert!(ticks <= 150);
    }
    assert_eq!(ticks, 150);
}

#[test]
fn second_fling_within_one_tick_stops_the_first_loop() {
    let mut vp = kinetic_viewport(0.9);
    vp.begin_drag(Point::new(0.0, 500.0));
    vp.drag_to(Point::new(0.0, 450.0));
    let (first, _) = vp.end_drag().unwrap();

    vp.begin_drag(Point::new(0.0, 500.0));
    vp.drag_to(Point::new(0.0, 480.0));
    let (second, _) = vp.end_drag().unwrap();
    assert_eq!(vp.scroll().vertical_offset(), 70.0);

    let now = Instant::now();
    assert_eq!(vp.inertia_tick(first, now), None);
    assert_eq!(vp.scroll().vertical_offset(), 70.0);
    assert_eq!(vp.kinetic_phase(), KineticPhase::Inertia);

    assert!(vp.inertia_tick(second, now).is_some());
    assert!(vp.inertia_tick(second, now).is_some());
    assert_eq!(vp.scroll().vertical_offset(), 90.0);
    assert_eq!(vp.inertia_tick(first, now), None);
    assert_eq!(vp.scroll().vertical_offset(), 90.0);
}

#[test]
fn kinetic_off_means_no_drag() {
    let mut vp = loaded(
        explicit_config(DisplayMode::Continuous),
        Arc::new(FakeDocument::letter(10)),
    );
    assert!(!vp.begin_drag(Point::new(0.0, 10.0)));
    vp.drag_to(Point::new(0.0, 0.0));
    assert_eq!(vp.scroll().vertical_offset(), 0.0);
    assert_eq!(vp.end_drag(), None);

    vp.enable_kinetic(true);
    assert!(vp.begin_drag(Point::new(0.0, 10.0)));
}
