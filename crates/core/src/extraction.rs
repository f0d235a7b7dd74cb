//! Asynchronous text extraction pipeline
//!
//! Rendered bitmaps are queued per page and drained by one background worker
//! in last-in-first-out order, so the page the user scrolled to most recently
//! is recognized first. Each result is published into the shared
//! [`WordIndex`] as a whole.

use crate::ocr::{normalize_elements, OcrService};
use crate::word_index::{PageWords, WordIndex};
use notepdf_render::Bitmap;
use notepdf_scheduler::{LifoQueue, QueueWorker, WorkerError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Recognition step run by the worker for each dequeued page
#[derive(Clone)]
struct Pipeline {
    ocr: Arc<dyn OcrService>,
    index: Arc<WordIndex>,
}

impl Pipeline {
    fn process(&self, page_index: usize, bitmap: Arc<Bitmap>) {
        if self.index.contains(page_index) {
            tracing::debug!(page = page_index, "page already extracted, skipping");
            return;
        }

        let words = match self.ocr.recognize(&bitmap) {
            Ok(elements) => normalize_elements(elements, bitmap.width(), bitmap.height()),
            Err(e) => {
                // A failed page is recorded as empty so it is never retried.
                tracing::warn!(page = page_index, error = %e, "text recognition failed");
                Vec::new()
            }
        };
        self.index.publish(page_index, words);
    }
}

/// Single-worker OCR queue feeding the word index
pub struct ExtractionQueue {
    queue: Arc<LifoQueue<usize, Arc<Bitmap>>>,
    pipeline: Pipeline,
    worker: Mutex<Option<QueueWorker>>,
}

impl ExtractionQueue {
    /// Create an idle queue; call [`start`](Self::start) to begin draining it
    pub fn new(ocr: Arc<dyn OcrService>, index: Arc<WordIndex>) -> Self {
        Self {
            queue: Arc::new(LifoQueue::new()),
            pipeline: Pipeline { ocr, index },
            worker: Mutex::new(None),
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<QueueWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the background worker (no-op if it is already running)
    pub fn start(&self) -> Result<(), WorkerError> {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(QueueWorker::is_running) {
            return Ok(());
        }

        let pipeline = self.pipeline.clone();
        *worker = Some(QueueWorker::spawn(
            "notepdf-extraction",
            self.queue.clone(),
            move |page, bitmap| pipeline.process(page, bitmap),
        )?);
        tracing::debug!("extraction worker started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(QueueWorker::is_running)
    }

    /// Queue a page for recognition ahead of everything already queued
    ///
    /// Returns `false` if the page's words are already known. A request already
    /// queued for the page is replaced and moved to the top.
    pub fn submit(&self, page_index: usize, bitmap: Arc<Bitmap>) -> bool {
        if self.pipeline.index.contains(page_index) {
            return false;
        }
        if self.queue.push(page_index, bitmap).is_some() {
            tracing::debug!(page = page_index, "replaced queued extraction request");
        }
        true
    }

    /// Queue a page behind every foreground request
    ///
    /// Used by the full-document scan. Never displaces a request already
    /// queued for the page; returns `true` only if a new request was queued.
    pub fn submit_background(&self, page_index: usize, bitmap: Arc<Bitmap>) -> bool {
        if self.pipeline.index.contains(page_index) {
            return false;
        }
        self.queue.push_bottom(page_index, bitmap)
    }

    /// `true` while a request for the page waits in the queue
    pub fn is_pending(&self, page_index: usize) -> bool {
        self.queue.contains(&page_index)
    }

    /// Words for a page, or `None` while it has not been extracted
    pub fn words_for(&self, page_index: usize) -> Option<PageWords> {
        self.pipeline.index.words_for(page_index)
    }

    pub fn index(&self) -> &Arc<WordIndex> {
        &self.pipeline.index
    }

    /// Number of queued requests (the in-flight one excluded)
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queued page indices, next to be processed first
    pub fn pending_pages(&self) -> Vec<usize> {
        self.queue.keys()
    }

    /// Block until fewer than `limit` requests are queued or `timeout` elapses
    pub fn wait_for_backlog_below(&self, limit: usize, timeout: Duration) -> bool {
        self.queue.wait_len_below(limit, timeout)
    }

    /// Stop the worker after its in-flight request and drop the rest
    pub fn shutdown(&self) -> Result<(), WorkerError> {
        self.queue.clear();
        match self.lock_worker().take() {
            Some(worker) => worker.shutdown(),
            None => {
                self.queue.close();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRasterizer, ScriptedOcr};
    use notepdf_render::Rasterizer;
    use std::sync::mpsc::Receiver;

    fn bitmap(page: usize) -> Arc<Bitmap> {
        Arc::new(FakeRasterizer::new(16).render(page, 100).unwrap())
    }

    fn setup(ocr: ScriptedOcr) -> (ExtractionQueue, Receiver<usize>) {
        let index = Arc::new(WordIndex::new());
        let rx = index.subscribe();
        (ExtractionQueue::new(Arc::new(ocr), index), rx)
    }

    fn wait_for(rx: &Receiver<usize>, count: usize) -> Vec<usize> {
        (0..count)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect()
    }

    #[test]
    fn test_drains_in_lifo_order() {
        let ocr = ScriptedOcr::new();
        let (queue, rx) = setup(ocr.clone());

        queue.submit(1, bitmap(1));
        queue.submit(2, bitmap(2));
        queue.submit(3, bitmap(3));
        queue.start().unwrap();

        assert_eq!(wait_for(&rx, 3), vec![3, 2, 1]);
        assert_eq!(ocr.calls(), vec![3, 2, 1]);
        queue.shutdown().unwrap();
    }

    #[test]
    fn test_resubmit_replaces_and_promotes() {
        let ocr = ScriptedOcr::new();
        let (queue, rx) = setup(ocr.clone());

        queue.submit(1, bitmap(1));
        queue.submit(2, bitmap(2));
        queue.submit(1, bitmap(1));
        assert_eq!(queue.pending_pages(), vec![1, 2]);

        queue.start().unwrap();
        wait_for(&rx, 2);
        assert_eq!(ocr.calls(), vec![1, 2]);
        queue.shutdown().unwrap();
    }

    #[test]
    fn test_known_page_is_not_queued() {
        let (queue, _rx) = setup(ScriptedOcr::new());
        queue.index().publish(4, Vec::new());

        assert!(!queue.submit(4, bitmap(4)));
        assert!(!queue.submit_background(4, bitmap(4)));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_ocr_failure_publishes_empty_list() {
        let ocr = ScriptedOcr::new()
            .with_page(0, &["hello"])
            .with_failure(1);
        let (queue, rx) = setup(ocr.clone());

        queue.submit(0, bitmap(0));
        queue.submit(1, bitmap(1));
        queue.start().unwrap();
        wait_for(&rx, 2);

        assert_eq!(queue.words_for(1).map(|w| w.len()), Some(0));
        assert_eq!(queue.words_for(0).unwrap()[0].text, "hello");
        assert!(!queue.submit(1, bitmap(1)));
        queue.shutdown().unwrap();
    }

    #[test]
    fn test_page_indexed_while_queued_is_skipped() {
        let ocr = ScriptedOcr::new();
        let index = Arc::new(WordIndex::new());
        let queue = ExtractionQueue::new(Arc::new(ocr.clone()), index.clone());

        queue.submit(2, bitmap(2));
        queue.submit(1, bitmap(1));
        index.publish(1, Vec::new());
        let rx = index.subscribe();

        queue.start().unwrap();
        assert_eq!(wait_for(&rx, 1), vec![2]);
        assert_eq!(ocr.calls(), vec![2]);
        queue.shutdown().unwrap();
    }

    #[test]
    fn test_background_requests_stay_below_foreground() {
        let (queue, _rx) = setup(ScriptedOcr::new());

        assert!(queue.submit_background(5, bitmap(5)));
        queue.submit(1, bitmap(1));
        assert!(queue.submit_background(6, bitmap(6)));
        assert!(!queue.submit_background(1, bitmap(1)));

        assert_eq!(queue.pending_pages(), vec![1, 5, 6]);
    }

    #[test]
    fn test_start_is_idempotent_and_shutdown_stops() {
        let (queue, _rx) = setup(ScriptedOcr::new());
        queue.start().unwrap();
        queue.start().unwrap();
        assert!(queue.is_running());

        queue.shutdown().unwrap();
        assert!(!queue.is_running());
    }
}
