//! RAM page cache with LRU eviction
//!
//! Keeps rendered pages in memory and evicts the least recently used page
//! once the configured page capacity is reached. Values are shared behind
//! `Arc`, so two hits for the same page hand out the same allocation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Page index used as the cache key
pub type PageKey = usize;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of pages currently in cache
    pub page_count: usize,

    /// Maximum number of pages allowed
    pub capacity: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of pages evicted to stay within capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState<V> {
    /// Map from page index to cached value
    pages: HashMap<PageKey, Arc<V>>,

    /// LRU queue (most recently used at back, least recently used at front)
    lru_queue: VecDeque<PageKey>,

    capacity: usize,

    stats: CacheStats,
}

impl<V> CacheState<V> {
    fn new(capacity: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_queue: VecDeque::new(),
            capacity,
            stats: CacheStats {
                capacity,
                ..Default::default()
            },
        }
    }

    /// Move a key to the back of the LRU queue (mark as most recently used)
    fn touch(&mut self, key: PageKey) {
        self.lru_queue.retain(|&k| k != key);
        self.lru_queue.push_back(key);
    }

    fn evict_lru(&mut self) -> Option<PageKey> {
        let key = self.lru_queue.pop_front()?;
        self.pages.remove(&key)?;
        self.stats.evictions += 1;
        self.stats.page_count = self.pages.len();
        tracing::debug!(page = key, "evicted page from cache");
        Some(key)
    }

    /// Evict pages until `incoming` more would still fit
    fn evict_to_fit(&mut self, incoming: usize) {
        while self.pages.len() + incoming > self.capacity && !self.pages.is_empty() {
            if self.evict_lru().is_none() {
                break;
            }
        }
    }
}

/// RAM page cache with LRU eviction
///
/// Thread-safe in-memory cache for rendered pages. When the cache holds
/// `capacity` pages, inserting another evicts the least recently used one.
///
/// # Example
///
/// ```
/// use notepdf_cache::RamPageCache;
/// use std::sync::Arc;
///
/// let cache: RamPageCache<Vec<u8>> = RamPageCache::new(10);
/// cache.put(0, Arc::new(vec![0u8; 16]));
///
/// let hit = cache.get(0).expect("page should be cached");
/// assert_eq!(hit.len(), 16);
/// assert_eq!(cache.stats().hits, 1);
/// ```
pub struct RamPageCache<V> {
    state: Mutex<CacheState<V>>,
}

impl<V> RamPageCache<V> {
    /// Create a cache that holds at most `capacity` pages
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a page in the cache
    ///
    /// Replaces any value already cached for `key`. Returns the key of the page
    /// evicted to make room, if any.
    pub fn put(&self, key: PageKey, value: Arc<V>) -> Option<PageKey> {
        let mut state = self.lock();
        if state.capacity == 0 {
            return None;
        }

        let mut evicted = None;
        if state.pages.remove(&key).is_some() {
            state.lru_queue.retain(|&k| k != key);
        } else {
            let before = state.stats.evictions;
            let front = state.lru_queue.front().copied();
            state.evict_to_fit(1);
            if state.stats.evictions > before {
                evicted = front;
            }
        }

        state.pages.insert(key, value);
        state.touch(key);
        state.stats.page_count = state.pages.len();
        evicted
    }

    /// Retrieve a page, marking it most recently used
    pub fn get(&self, key: PageKey) -> Option<Arc<V>> {
        let mut state = self.lock();

        if let Some(value) = state.pages.get(&key).cloned() {
            state.touch(key);
            state.stats.hits += 1;
            Some(value)
        } else {
            state.stats.misses += 1;
            None
        }
    }

    /// Check if a page is cached without updating LRU tracking or statistics
    pub fn contains(&self, key: PageKey) -> bool {
        self.lock().pages.contains_key(&key)
    }

    /// Remove a page from the cache
    pub fn remove(&self, key: PageKey) -> Option<Arc<V>> {
        let mut state = self.lock();
        let value = state.pages.remove(&key)?;
        state.lru_queue.retain(|&k| k != key);
        state.stats.page_count = state.pages.len();
        Some(value)
    }

    /// Drop every cached page
    pub fn clear(&self) {
        let mut state = self.lock();
        state.pages.clear();
        state.lru_queue.clear();
        state.stats.page_count = 0;
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Change the page capacity, evicting least recently used pages if needed
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.lock();
        state.capacity = capacity;
        state.stats.capacity = capacity;
        state.evict_to_fit(0);
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of pages currently cached
    pub fn len(&self) -> usize {
        self.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pages.is_empty()
    }
}

impl<V> Default for RamPageCache<V> {
    /// A ten page cache
    fn default() -> Self {
        Self::new(10)
    }
}
