//! Rendered page store
//!
//! Renders pages through the document's rasterizer and keeps the most
//! recently used ones in a bounded cache. The rasterizer handle is not
//! reentrant, so every call into it goes through one mutex; cache hits never
//! touch that lock.

use crate::config::PageStoreConfig;
use notepdf_cache::{CacheStats, RamPageCache};
use notepdf_render::{Bitmap, Rasterizer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Page bitmap source with LRU caching
pub struct PageStore {
    rasterizer: Mutex<Box<dyn Rasterizer>>,
    cache: RamPageCache<Bitmap>,
    config: PageStoreConfig,
}

impl PageStore {
    pub fn new<R: Rasterizer + 'static>(rasterizer: R, config: PageStoreConfig) -> Self {
        Self::from_boxed(Box::new(rasterizer), config)
    }

    pub fn from_boxed(rasterizer: Box<dyn Rasterizer>, config: PageStoreConfig) -> Self {
        Self {
            rasterizer: Mutex::new(rasterizer),
            cache: RamPageCache::new(config.capacity),
            config,
        }
    }

    fn lock_rasterizer(&self) -> MutexGuard<'_, Box<dyn Rasterizer>> {
        self.rasterizer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bitmap for a page, rendering and caching it on a miss
    ///
    /// Returns `None` if the rasterizer fails; failures are not cached, so the
    /// next request retries.
    pub fn get(&self, page_index: usize) -> Option<Arc<Bitmap>> {
        if let Some(bitmap) = self.cache.get(page_index) {
            return Some(bitmap);
        }

        let mut rasterizer = self.lock_rasterizer();

        // Another caller may have rendered this page while we waited.
        if self.cache.contains(page_index) {
            if let Some(bitmap) = self.cache.get(page_index) {
                return Some(bitmap);
            }
        }

        let width = self.config.target_width();
        match rasterizer.render(page_index, width) {
            Ok(bitmap) => {
                let bitmap = Arc::new(bitmap);
                if let Some(evicted) = self.cache.put(page_index, bitmap.clone()) {
                    tracing::debug!(page = page_index, evicted, "page cache full");
                }
                Some(bitmap)
            }
            Err(e) => {
                tracing::warn!(page = page_index, error = %e, "page render failed");
                None
            }
        }
    }

    /// Render a page without reading or filling the cache
    ///
    /// Used for throwaway renders (background text extraction) that must not
    /// evict pages the user is looking at.
    pub fn render_uncached(&self, page_index: usize, target_width: u32) -> Option<Arc<Bitmap>> {
        match self.lock_rasterizer().render(page_index, target_width) {
            Ok(bitmap) => Some(Arc::new(bitmap)),
            Err(e) => {
                tracing::warn!(page = page_index, error = %e, "uncached render failed");
                None
            }
        }
    }

    /// Number of pages in the current document
    pub fn page_count(&self) -> usize {
        self.lock_rasterizer().page_count()
    }

    /// Drop every cached bitmap
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    /// Switch to another document's rasterizer, dropping the cache
    pub fn replace_rasterizer<R: Rasterizer + 'static>(&self, rasterizer: R) {
        let mut current = self.lock_rasterizer();
        *current = Box::new(rasterizer);
        self.cache.clear();
    }

    pub fn is_cached(&self, page_index: usize) -> bool {
        self.cache.contains(page_index)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn config(&self) -> &PageStoreConfig {
        &self.config
    }
}
