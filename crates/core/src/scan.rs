//! Full-document background scan
//!
//! While a search query is active, every page that has not been extracted yet
//! is rendered at a low width and queued for recognition behind the pages the
//! user is looking at. The scan checks its cancellation token between pages
//! and restarts whenever the query text changes.

use crate::config::ExtractionConfig;
use crate::extraction::ExtractionQueue;
use crate::page_store::PageStore;
use notepdf_scheduler::CancellationToken;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Outcome of one scan run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Pages queued for extraction
    pub submitted: usize,

    /// Pages already extracted or already queued
    pub skipped: usize,

    /// Pages the rasterizer could not render
    pub failed: usize,

    pub cancelled: bool,
}

struct ScanHandle {
    token: CancellationToken,
    thread: JoinHandle<ScanReport>,
}

struct ScanContext {
    store: Arc<PageStore>,
    extraction: Arc<ExtractionQueue>,
    config: ExtractionConfig,
    scan_width: u32,
}

impl ScanContext {
    fn run(&self, token: &CancellationToken) -> ScanReport {
        let mut report = ScanReport::default();
        let page_count = self.store.page_count();
        let limit = self.config.max_scan_backlog.max(1);
        let poll = self.config.scan_poll_interval();

        'pages: for page in 0..page_count {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.extraction.index().contains(page) {
                report.skipped += 1;
                continue;
            }

            while !self.extraction.wait_for_backlog_below(limit, poll) {
                if token.is_cancelled() {
                    report.cancelled = true;
                    break 'pages;
                }
            }
            if self.extraction.is_pending(page) {
                report.skipped += 1;
                continue;
            }

            match self.store.render_uncached(page, self.scan_width) {
                Some(bitmap) => {
                    if self.extraction.submit_background(page, bitmap) {
                        report.submitted += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                None => report.failed += 1,
            }

            thread::yield_now();
        }

        report
    }
}

/// Owner of the (at most one) running full-document scan
pub struct DocumentScanner {
    context: Arc<ScanContext>,
    current: Mutex<Option<ScanHandle>>,
}

impl DocumentScanner {
    pub fn new(
        store: Arc<PageStore>,
        extraction: Arc<ExtractionQueue>,
        config: ExtractionConfig,
    ) -> Self {
        let scan_width = store.config().scan_width;
        Self {
            context: Arc::new(ScanContext {
                store,
                extraction,
                config,
                scan_width,
            }),
            current: Mutex::new(None),
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<ScanHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the running scan and start a new one for `query`
    ///
    /// A blank query only cancels. Returns `true` if a new scan was started.
    pub fn restart(&self, query: &str) -> io::Result<bool> {
        let mut current = self.lock_current();
        if let Some(previous) = current.take() {
            previous.token.cancel();
        }

        if query.trim().is_empty() {
            return Ok(false);
        }

        let token = CancellationToken::new();
        let context = self.context.clone();
        let scan_token = token.clone();
        let thread = thread::Builder::new()
            .name("notepdf-scan".to_string())
            .spawn(move || {
                tracing::info!("document scan started");
                let report = context.run(&scan_token);
                tracing::info!(
                    submitted = report.submitted,
                    skipped = report.skipped,
                    failed = report.failed,
                    cancelled = report.cancelled,
                    "document scan finished"
                );
                report
            })?;

        *current = Some(ScanHandle { token, thread });
        Ok(true)
    }

    /// Cancel the running scan, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.lock_current().as_ref() {
            handle.token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_current()
            .as_ref()
            .is_some_and(|handle| !handle.thread.is_finished())
    }

    /// Wait for the current scan to end and return its report
    pub fn wait(&self) -> Option<ScanReport> {
        let handle = self.lock_current().take()?;
        handle.thread.join().ok()
    }
}

impl Drop for DocumentScanner {
    fn drop(&mut self) {
        self.cancel();
    }
}
