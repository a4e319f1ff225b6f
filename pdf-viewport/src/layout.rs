//! Page layout math: intrinsic page size to on-screen pixel size.
//!
//! Layout is a pure function of the page's intrinsic size and the current
//! viewport state. A viewport that has not been measured yet produces no
//! layout at all; callers retry on the next size-changed notification.

use crate::rotation::Rotation;
use serde::{Deserialize, Serialize};

/// How pages are arranged in the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Single,
    Book,
    Continuous,
}

impl DisplayMode {
    /// Number of visual slots this mode keeps for a document.
    pub fn slot_count(self, page_count: usize) -> usize {
        match self {
            DisplayMode::Single => 1,
            DisplayMode::Book => 2,
            DisplayMode::Continuous => page_count,
        }
    }

    /// Pages advanced by one next/previous step.
    pub fn page_step(self) -> usize {
        match self {
            DisplayMode::Book => 2,
            DisplayMode::Single | DisplayMode::Continuous => 1,
        }
    }
}

/// How the zoom factor is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZoomMode {
    FitWidth,
    #[default]
    FitHeight,
    Explicit,
}

/// Intrinsic page size in document units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size after applying `rotation` for layout purposes.
    pub fn rotated(self, rotation: Rotation) -> Self {
        if rotation.swaps_axes() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }
}

/// Integer pixel size of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const ZERO: PixelSize = PixelSize {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Everything the layout calculator needs besides the page itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub scrollbar_reserve: f64,
    pub rotation: Rotation,
    pub zoom_mode: ZoomMode,
    pub display_mode: DisplayMode,
    /// Stored zoom, used unchanged in [`ZoomMode::Explicit`].
    pub zoom: f64,
    pub zoom_min: f64,
    pub zoom_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub size: PixelSize,
    /// Zoom the size was derived from. For fit modes this is the implied zoom.
    pub zoom: f64,
}

/// Compute the target pixel size of a page.
///
/// Returns `None` while the viewport has no size (layout deferral) or the
/// page reports a degenerate intrinsic size.
pub fn compute_page_layout(page: PageSize, params: &LayoutParams) -> Option<PageLayout> {
    if params.viewport_width <= 0.0 || params.viewport_height <= 0.0 {
        return None;
    }
    if page.width <= 0.0 || page.height <= 0.0 {
        return None;
    }

    let effective = page.rotated(params.rotation);
    let zoom = match params.zoom_mode {
        ZoomMode::FitHeight => params.viewport_height / effective.height,
        ZoomMode::FitWidth => {
            let mut usable = params.viewport_width - params.scrollbar_reserve;
            if params.display_mode == DisplayMode::Book {
                usable /= 2.0;
            }
            usable / effective.width
        }
        ZoomMode::Explicit => params.zoom,
    };
    let zoom = zoom.clamp(params.zoom_min, params.zoom_max);

    Some(PageLayout {
        size: PixelSize::new(
            floor_pixels(effective.width * zoom),
            floor_pixels(effective.height * zoom),
        ),
        zoom,
    })
}

fn floor_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f64) as u32
    } else {
        0
    }
}
