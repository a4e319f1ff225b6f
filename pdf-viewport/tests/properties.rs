mod common;

use common::{explicit_config, loaded, FakeDocument, VIEWPORT_HEIGHT};
use pdf_viewport::scroll::visible_window;
use pdf_viewport::{DisplayMode, Rotation, ViewportConfig, ZoomMode};
use proptest::prelude::*;
use std::sync::Arc;

fn display_mode() -> impl Strategy<Value = DisplayMode> {
    prop_oneof![
        Just(DisplayMode::Single),
        Just(DisplayMode::Book),
        Just(DisplayMode::Continuous),
    ]
}

#[derive(Debug, Clone, Copy)]
enum ZoomOp {
    In,
    Out,
    Set(f64),
}

fn zoom_op() -> impl Strategy<Value = ZoomOp> {
    prop_oneof![
        Just(ZoomOp::In),
        Just(ZoomOp::Out),
        (-10.0f64..50.0).prop_map(ZoomOp::Set),
    ]
}

proptest! {
    #[test]
    fn goto_lands_on_the_requested_page(mode in display_mode(), page in 0usize..20) {
        let mut vp = loaded(explicit_config(mode), Arc::new(FakeDocument::letter(20)));
        vp.goto_page(page);
        prop_assert_eq!(vp.current_page(), page);
    }

    #[test]
    fn zoom_never_leaves_its_bounds(ops in prop::collection::vec(zoom_op(), 1..30)) {
        let config = ViewportConfig {
            zoom_min: 0.5,
            zoom_max: 3.0,
            ..explicit_config(DisplayMode::Single)
        };
        let mut vp = loaded(config, Arc::new(FakeDocument::letter(2)));
        for op in ops {
            match op {
                ZoomOp::In => vp.zoom_in(),
                ZoomOp::Out => vp.zoom_out(),
                ZoomOp::Set(zoom) => vp.set_zoom(zoom),
            }
            prop_assert!(vp.zoom() >= 0.5 && vp.zoom() <= 3.0, "zoom {}", vp.zoom());
        }
    }

    #[test]
    fn four_turns_either_way_are_identity(start in 0u8..4, clockwise in any::<bool>()) {
        let mut rotation = (0..start).fold(Rotation::Rotate0, |r, _| r.clockwise());
        let original = rotation;
        for _ in 0..4 {
            rotation = if clockwise { rotation.clockwise() } else { rotation.counterclockwise() };
        }
        prop_assert_eq!(rotation, original);
    }

    #[test]
    fn fit_height_zoom_is_the_height_ratio(height in 50.0f64..1500.0) {
        let config = ViewportConfig {
            zoom_mode: ZoomMode::FitHeight,
            zoom_min: 0.01,
            zoom_max: 100.0,
            ..ViewportConfig::default()
        };
        let vp = loaded(config, Arc::new(FakeDocument::uniform(3, 100.0, height)));
        prop_assert!((vp.zoom() - VIEWPORT_HEIGHT / height).abs() < 1e-9);
    }

    #[test]
    fn cache_matches_the_visible_window(offset in 0.0f64..2500.0, count in 1usize..30) {
        let mut vp = loaded(
            explicit_config(DisplayMode::Continuous),
            Arc::new(FakeDocument::letter(count)),
        );
        vp.set_scroll_offset(0.0, offset);
        vp.poll_renders();

        let shown = vp.scroll().vertical_offset();
        let (start, end) = visible_window(
            shown,
            VIEWPORT_HEIGHT,
            200.0,
            2.0 * vp.frame_space(),
            count,
        )
        .unwrap();
        prop_assert_eq!(vp.cache().cached_pages(), (start..=end).collect::<Vec<_>>());
        prop_assert_eq!(vp.current_page(), start);
    }
}
