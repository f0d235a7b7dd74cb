//! Keyed last-in-first-out job queue
//!
//! Jobs are keyed (by page index in the viewer) and at most one job per key is
//! ever queued. Pushing a key that is already queued replaces the old job and
//! moves it to the top of the stack, so the most recently requested page is
//! always handed out first.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct QueueState<K, V> {
    /// Bottom of the stack at the front, top at the back
    items: VecDeque<(K, V)>,
    closed: bool,
}

impl<K: PartialEq, V> QueueState<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.items.iter().position(|(k, _)| k == key)
    }
}

/// Thread-safe keyed LIFO queue with blocking pop
///
/// A single condition variable signals every state change, so consumers
/// blocked in [`pop_blocking`](Self::pop_blocking) and producers throttling on
/// [`wait_len_below`](Self::wait_len_below) both wake without polling.
pub struct LifoQueue<K, V> {
    state: Mutex<QueueState<K, V>>,
    changed: Condvar,
}

impl<K: PartialEq + Clone, V> LifoQueue<K, V> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a job onto the top of the stack
    ///
    /// A job already queued under the same key is removed first. Returns the
    /// replaced job, if any. Pushing onto a closed queue drops the job.
    pub fn push(&self, key: K, value: V) -> Option<V> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }

        let replaced = state
            .position(&key)
            .and_then(|pos| state.items.remove(pos))
            .map(|(_, v)| v);
        state.items.push_back((key, value));
        drop(state);

        self.changed.notify_all();
        replaced
    }

    /// Push a job onto the bottom of the stack unless its key is already queued
    ///
    /// Bottom jobs run only after every job pushed with [`push`](Self::push).
    /// Returns `false` if the key was already queued or the queue is closed.
    pub fn push_bottom(&self, key: K, value: V) -> bool {
        let mut state = self.lock();
        if state.closed || state.position(&key).is_some() {
            return false;
        }
        state.items.push_front((key, value));
        drop(state);

        self.changed.notify_all();
        true
    }

    /// Pop the most recently pushed job without blocking
    pub fn pop(&self) -> Option<(K, V)> {
        let item = self.lock().items.pop_back();
        if item.is_some() {
            self.changed.notify_all();
        }
        item
    }

    /// Pop the most recently pushed job, blocking while the queue is empty
    ///
    /// Returns `None` once the queue has been closed.
    pub fn pop_blocking(&self) -> Option<(K, V)> {
        let state = self.lock();
        let mut state = self
            .changed
            .wait_while(state, |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if state.closed {
            return None;
        }
        let item = state.items.pop_back();
        drop(state);

        self.changed.notify_all();
        item
    }

    /// Block until fewer than `limit` jobs are queued, or `timeout` elapses
    ///
    /// Returns `true` if the queue length is below `limit` when the wait ends.
    pub fn wait_len_below(&self, limit: usize, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |s| s.items.len() >= limit && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        state.items.len() < limit
    }

    /// Check whether a job with this key is queued
    pub fn contains(&self, key: &K) -> bool {
        self.lock().position(key).is_some()
    }

    /// Queued keys, top of the stack first
    pub fn keys(&self) -> Vec<K> {
        self.lock().items.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Drop every queued job
    pub fn clear(&self) {
        self.lock().items.clear();
        self.changed.notify_all();
    }

    /// Close the queue, waking every blocked consumer
    ///
    /// Further pushes are ignored and [`pop_blocking`](Self::pop_blocking)
    /// returns `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<K: PartialEq + Clone, V> Default for LifoQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
