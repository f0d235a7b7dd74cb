//! NotePdf Scheduler Library
//!
//! Background work plumbing for the viewer core: a keyed last-in-first-out
//! job queue, the single worker thread that drains it, and cooperative
//! cancellation tokens for long-running background scans.
//!
//! # Example
//!
//! ```
//! use notepdf_scheduler::{LifoQueue, QueueWorker};
//! use std::sync::{mpsc, Arc};
//!
//! let queue: Arc<LifoQueue<usize, String>> = Arc::new(LifoQueue::new());
//! let (tx, rx) = mpsc::channel();
//!
//! queue.push(1, "first".to_string());
//! queue.push(2, "second".to_string());
//!
//! let worker = QueueWorker::spawn("example-worker", queue.clone(), move |key, _job| {
//!     let _ = tx.send(key);
//! })
//! .unwrap();
//!
//! // Most recently pushed job runs first
//! assert_eq!(rx.recv().unwrap(), 2);
//! assert_eq!(rx.recv().unwrap(), 1);
//! worker.shutdown();
//! ```

mod cancel;
mod queue;
mod worker;

pub use cancel::CancellationToken;
pub use queue::LifoQueue;
pub use worker::{QueueWorker, WorkerError};
