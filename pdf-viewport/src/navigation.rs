use crate::layout::DisplayMode;

/// Page reached by one next/previous step from `current`, or `None` when the
/// boundary is already reached.
pub fn step_page(current: usize, forward: bool, mode: DisplayMode, page_count: usize) -> Option<usize> {
    if page_count == 0 {
        return None;
    }
    let step = mode.page_step();
    let last_reachable = page_count.saturating_sub(step);
    let target = if forward {
        current.saturating_add(step).min(last_reachable)
    } else {
        current.saturating_sub(step)
    };
    let moved = if forward { target > current } else { target < current };
    moved.then_some(target)
}

/// Clamp a requested page into the document.
pub fn clamp_page(page: usize, page_count: usize) -> usize {
    page.min(page_count.saturating_sub(1))
}
