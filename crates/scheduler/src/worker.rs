//! Single background worker draining a [`LifoQueue`].
//!
//! Exactly one worker thread per queue means exactly one job is in flight at
//! a time, so results are published in the order jobs were taken off the
//! queue. The worker sleeps on the queue's condition variable while idle.

use crate::LifoQueue;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Errors raised while managing the worker thread
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker thread panicked")]
    Panicked,
}

/// Long-lived worker thread executing queued jobs one at a time
pub struct QueueWorker {
    thread: Option<JoinHandle<()>>,
    close: Box<dyn Fn() + Send + Sync>,
}

impl QueueWorker {
    /// Spawn a worker that pops jobs from `queue` and hands them to `executor`
    ///
    /// The worker exits once the queue is closed, either by
    /// [`shutdown`](Self::shutdown), by dropping the worker, or by another
    /// owner of the queue.
    pub fn spawn<K, V, F>(
        name: &str,
        queue: Arc<LifoQueue<K, V>>,
        executor: F,
    ) -> Result<Self, WorkerError>
    where
        K: PartialEq + Clone + Send + 'static,
        V: Send + 'static,
        F: Fn(K, V) + Send + 'static,
    {
        let worker_queue = queue.clone();
        let thread_name = name.to_string();
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::debug!(worker = %thread_name, "worker started");
                while let Some((key, value)) = worker_queue.pop_blocking() {
                    executor(key, value);
                }
                tracing::debug!(worker = %thread_name, "worker stopped");
            })?;

        Ok(Self {
            thread: Some(thread),
            close: Box::new(move || queue.close()),
        })
    }

    /// True while the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Close the queue and wait for the in-flight job (if any) to finish
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), WorkerError> {
        (self.close)();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        // Closing is enough; a hung job must not block the dropping thread.
        (self.close)();
    }
}
