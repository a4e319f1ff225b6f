//! Visual slots and their page assignments.

use crate::layout::{DisplayMode, PixelSize};

/// Identifies one dispatched render so late results can be matched.
pub type Ticket = u64;

/// One visual position in the viewport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSlot {
    page: Option<usize>,
    size: PixelSize,
    pending: Option<Ticket>,
}

impl PageSlot {
    pub fn page(&self) -> Option<usize> {
        self.page
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Ticket of the render currently in flight for this slot.
    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// The slots of the current display mode.
///
/// Changing a slot's page or target size drops its in-flight ticket, so the
/// older render is discarded when it arrives.
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    mode: DisplayMode,
    slots: Vec<PageSlot>,
}

impl FrameSet {
    pub fn new(mode: DisplayMode, page_count: usize) -> Self {
        let mut frames = Self::default();
        frames.reallocate(mode, page_count);
        frames
    }

    /// Rebuild the slot array for a new mode or document.
    ///
    /// Continuous mode binds slot `i` to page `i` permanently; the other modes
    /// start unassigned.
    pub fn reallocate(&mut self, mode: DisplayMode, page_count: usize) {
        self.mode = mode;
        self.slots = (0..mode.slot_count(page_count))
            .map(|index| PageSlot {
                page: (mode == DisplayMode::Continuous).then_some(index),
                ..PageSlot::default()
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PageSlot> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageSlot> {
        self.slots.iter()
    }

    /// Index of the slot showing `page`.
    pub fn slot_of(&self, page: usize) -> Option<usize> {
        if self.mode == DisplayMode::Continuous {
            return (page < self.slots.len()).then_some(page);
        }
        self.slots.iter().position(|slot| slot.page == Some(page))
    }

    pub fn assign(&mut self, index: usize, page: Option<usize>) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.page != page {
                slot.page = page;
                slot.pending = None;
            }
        }
    }

    pub fn set_size(&mut self, index: usize, size: PixelSize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.size != size {
                slot.size = size;
                slot.pending = None;
            }
        }
    }

    pub fn set_pending(&mut self, index: usize, ticket: Ticket) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.pending = Some(ticket);
        }
    }

    /// Clear the pending ticket if it still is `ticket`. Returns whether it was.
    pub fn complete(&mut self, index: usize, ticket: Ticket) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.pending == Some(ticket) => {
                slot.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all_pending(&mut self) {
        for slot in &mut self.slots {
            slot.pending = None;
        }
    }

    /// Drop in-flight tickets of slots whose page falls outside `[low, high]`.
    pub fn cancel_pending_outside(&mut self, low: usize, high: usize) {
        for slot in &mut self.slots {
            if matches!(slot.page, Some(page) if page < low || page > high) {
                slot.pending = None;
            }
        }
    }

    /// Inclusive range of pages assigned to slots.
    pub fn assigned_range(&self) -> Option<(usize, usize)> {
        let mut pages = self.slots.iter().filter_map(|slot| slot.page);
        let first = pages.next()?;
        Some(pages.fold((first, first), |(low, high), page| {
            (low.min(page), high.max(page))
        }))
    }

    /// Top edge of `page`'s frame in continuous layout, each frame padded by
    /// `frame_space` on both sides.
    pub fn frame_top(&self, page: usize, frame_space: f64) -> f64 {
        self.slots
            .iter()
            .take(page)
            .map(|slot| slot.size.height as f64 + 2.0 * frame_space)
            .sum()
    }

    /// Total content size, frames stacked vertically in continuous mode and
    /// side by side otherwise.
    pub fn extent(&self, frame_space: f64) -> (f64, f64) {
        let padded = self.slots.iter().filter(|slot| slot.page.is_some()).map(|slot| {
            (
                slot.size.width as f64 + 2.0 * frame_space,
                slot.size.height as f64 + 2.0 * frame_space,
            )
        });
        if self.mode == DisplayMode::Continuous {
            padded.fold((0.0, 0.0), |(w, h), (sw, sh)| (f64::max(w, sw), h + sh))
        } else {
            padded.fold((0.0, 0.0), |(w, h), (sw, sh)| (w + sw, f64::max(h, sh)))
        }
    }
}
