use crate::document::PixelBuffer;
use crate::layout::PixelSize;
use std::collections::BTreeMap;
use tracing::debug;

/// A rendered page and the size it was rendered at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bitmap: PixelBuffer,
    pub size: PixelSize,
}

/// Rendered bitmaps keyed by page index.
///
/// Only the interactive owner touches the cache. Zoom, rotation, dpi and
/// render flags are implicit parts of the key, so changing any of them must
/// be followed by [`RenderCache::invalidate_all`].
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: BTreeMap<usize, CacheEntry>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: usize, bitmap: PixelBuffer) {
        let size = bitmap.size();
        self.entries.insert(page, CacheEntry { bitmap, size });
    }

    pub fn get(&self, page: usize) -> Option<&CacheEntry> {
        self.entries.get(&page)
    }

    /// Whether `page` is cached at exactly `size`.
    pub fn contains(&self, page: usize, size: PixelSize) -> bool {
        self.entries.get(&page).is_some_and(|entry| entry.size == size)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached page indices in ascending order.
    pub fn cached_pages(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    /// Drop every entry whose page lies outside `[low, high]`. Returns the
    /// number of entries released.
    pub fn evict_outside(&mut self, low: usize, high: usize) -> usize {
        let before = self.entries.len();
        // Dropping the entry frees its pixel storage.
        self.entries.retain(|&page, _| page >= low && page <= high);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(low, high, evicted, "evicted pages outside window");
        }
        evicted
    }

    /// Drop entries whose size no longer matches what `expected` reports.
    pub fn retain_matching(&mut self, mut expected: impl FnMut(usize) -> Option<PixelSize>) {
        self.entries
            .retain(|&page, entry| expected(page) == Some(entry.size));
    }

    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "render cache invalidated");
        }
        self.entries.clear();
    }
}
