//! NotePdf Cache Library
//!
//! In-memory page cache with LRU eviction, bounded by page count.

pub mod ram;

pub use ram::{CacheStats, PageKey, RamPageCache};
