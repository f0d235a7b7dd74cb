//! Per-page index of recognized words
//!
//! Each page's word list is published exactly once, as a whole, when text
//! extraction for that page finishes. A page missing from the index has not
//! been extracted yet; an extracted page with no text maps to an empty list.

use crate::geometry::NormalizedRect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// One recognized token on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub rect: NormalizedRect,
}

impl Word {
    pub fn new(text: impl Into<String>, rect: NormalizedRect) -> Self {
        Self {
            text: text.into(),
            rect,
        }
    }
}

/// Word list of one page, shared between readers
pub type PageWords = Arc<[Word]>;

/// Write-once map from page index to that page's words
///
/// Readers clone the `Arc` of a page's list, so they never observe a partially
/// published page. Every successful publish bumps [`generation`](Self::generation)
/// and notifies subscribers with the page index.
#[derive(Default)]
pub struct WordIndex {
    pages: RwLock<BTreeMap<usize, PageWords>>,
    generation: AtomicU64,
    subscribers: Mutex<Vec<Sender<usize>>>,
}

impl WordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the word list for a page
    ///
    /// Returns `false` without changing anything if the page was already published.
    pub fn publish(&self, page_index: usize, words: Vec<Word>) -> bool {
        let count = words.len();
        {
            let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
            if pages.contains_key(&page_index) {
                return false;
            }
            pages.insert(page_index, words.into());
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(page = page_index, words = count, "published page words");

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(page_index).is_ok());
        true
    }

    /// Words for a page, or `None` if the page has not been extracted yet
    pub fn words_for(&self, page_index: usize) -> Option<PageWords> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&page_index)
            .cloned()
    }

    pub fn contains(&self, page_index: usize) -> bool {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&page_index)
    }

    /// Copy of the whole index, ordered by page
    pub fn snapshot(&self) -> BTreeMap<usize, PageWords> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of extracted pages
    pub fn len(&self) -> usize {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter bumped on every publish and clear
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Receive the page index of every page published from now on
    pub fn subscribe(&self) -> Receiver<usize> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Forget every page (end of the document session)
    pub fn clear(&self) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
