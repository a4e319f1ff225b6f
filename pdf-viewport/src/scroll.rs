//! The scrollable area the viewport lives in, and the continuous-mode window
//! tracker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Keyboard-style scroll commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollAction {
    LineUp,
    LineDown,
    PageUp,
    PageDown,
    Home,
    End,
}

/// Scroll offsets, visible size and content size in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollArea {
    offset_x: f64,
    offset_y: f64,
    viewport_width: f64,
    viewport_height: f64,
    extent_width: f64,
    extent_height: f64,
}

impl ScrollArea {
    pub const SMALL_CHANGE: f64 = 1.0;
    pub const LARGE_CHANGE: f64 = 10.0;

    pub fn horizontal_offset(&self) -> f64 {
        self.offset_x
    }

    pub fn vertical_offset(&self) -> f64 {
        self.offset_y
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn scrollable_width(&self) -> f64 {
        (self.extent_width - self.viewport_width).max(0.0)
    }

    pub fn scrollable_height(&self) -> f64 {
        (self.extent_height - self.viewport_height).max(0.0)
    }

    pub fn is_measured(&self) -> bool {
        self.viewport_width > 0.0 && self.viewport_height > 0.0
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
        self.reclamp();
    }

    pub fn set_extent(&mut self, width: f64, height: f64) {
        self.extent_width = width.max(0.0);
        self.extent_height = height.max(0.0);
        self.reclamp();
    }

    /// Returns whether the stored offset moved.
    pub fn set_vertical_offset(&mut self, offset: f64) -> bool {
        let clamped = clamp_offset(offset, self.scrollable_height());
        let changed = clamped != self.offset_y;
        self.offset_y = clamped;
        changed
    }

    /// Returns whether the stored offset moved.
    pub fn set_horizontal_offset(&mut self, offset: f64) -> bool {
        let clamped = clamp_offset(offset, self.scrollable_width());
        let changed = clamped != self.offset_x;
        self.offset_x = clamped;
        changed
    }

    pub fn set_offset(&mut self, x: f64, y: f64) -> bool {
        let horizontal = self.set_horizontal_offset(x);
        let vertical = self.set_vertical_offset(y);
        horizontal || vertical
    }

    pub fn at_top(&self) -> bool {
        self.offset_y <= 0.0
    }

    pub fn at_bottom(&self) -> bool {
        self.offset_y >= self.scrollable_height()
    }

    /// Apply a keyboard scroll command. Returns whether the offset moved.
    pub fn perform_scroll(&mut self, action: ScrollAction, orientation: Orientation) -> bool {
        let (offset, scrollable) = match orientation {
            Orientation::Vertical => (self.offset_y, self.scrollable_height()),
            Orientation::Horizontal => (self.offset_x, self.scrollable_width()),
        };
        let target = match action {
            ScrollAction::LineUp => offset - Self::SMALL_CHANGE,
            ScrollAction::LineDown => offset + Self::SMALL_CHANGE,
            ScrollAction::PageUp => offset - Self::LARGE_CHANGE,
            ScrollAction::PageDown => offset + Self::LARGE_CHANGE,
            ScrollAction::Home => 0.0,
            ScrollAction::End => scrollable,
        };
        match orientation {
            Orientation::Vertical => self.set_vertical_offset(target),
            Orientation::Horizontal => self.set_horizontal_offset(target),
        }
    }

    fn reclamp(&mut self) {
        self.offset_x = clamp_offset(self.offset_x, self.scrollable_width());
        self.offset_y = clamp_offset(self.offset_y, self.scrollable_height());
    }
}

fn clamp_offset(offset: f64, scrollable: f64) -> f64 {
    if offset.is_nan() {
        0.0
    } else {
        offset.clamp(0.0, scrollable)
    }
}

/// Visible page range in continuous mode, both ends inclusive.
///
/// Every page is assumed to be `page_height` tall plus `spacing` between
/// pages. Returns `None` for an empty document or a degenerate pitch.
pub fn visible_window(
    offset: f64,
    viewport_height: f64,
    page_height: f64,
    spacing: f64,
    page_count: usize,
) -> Option<(usize, usize)> {
    let pitch = page_height + spacing;
    if page_count == 0 || pitch.is_nan() || pitch <= 0.0 {
        return None;
    }
    let last = page_count - 1;
    let index = |position: f64| -> usize {
        let slot = (position / pitch).floor();
        if slot <= 0.0 {
            0
        } else {
            (slot.min(last as f64)) as usize
        }
    };
    Some((index(offset), index(offset + viewport_height)))
}
