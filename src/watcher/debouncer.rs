//! Per-path debouncing of raw filesystem events.
//!
//! Each distinct path owns one logical timer. The first event arms it with
//! the full window, every later event for the same path resets it, and only
//! when the window passes without a new event is a single coalesced event
//! released. Bursts of rewrites (editor saves, copies) therefore reach the
//! index pipeline once.

use std::collections::HashMap;
use std::future::poll_fn;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;

use super::event::{DebouncedEvent, RawEventKind};

#[derive(Debug)]
struct PendingPath {
    key: Key,
    kind: RawEventKind,
}

/// Debounces raw events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending paths: path -> timer key and merged event kind.
    pending: HashMap<PathBuf, PendingPath>,
    timers: DelayQueue<PathBuf>,
    /// Quiet period a path must see before its event is released.
    window: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            timers: DelayQueue::new(),
            window,
        }
    }

    /// Record a raw event, arming or resetting the path's timer.
    pub fn record(&mut self, path: PathBuf, kind: RawEventKind) {
        match self.pending.get_mut(&path) {
            Some(pending) => {
                self.timers.reset(&pending.key, self.window);
                pending.kind = pending.kind.merge(kind);
                crate::debug_event!("debounce", "reset", "{:?} {}", pending.kind, path.display());
            }
            None => {
                crate::debug_event!("debounce", "armed", "{kind:?} {}", path.display());
                let key = self.timers.insert(path.clone(), self.window);
                self.pending.insert(path, PendingPath { key, kind });
            }
        }
    }

    /// Wait for the next path whose timer fires.
    ///
    /// Resolves to `None` immediately when nothing is pending, so callers
    /// polling this inside `select!` should guard it with [`Self::has_pending`].
    pub async fn next_ready(&mut self) -> Option<DebouncedEvent> {
        let expired = poll_fn(|cx| self.timers.poll_expired(cx)).await?;
        let path = expired.into_inner();
        let pending = self.pending.remove(&path)?;
        Some(DebouncedEvent {
            path,
            kind: pending.kind,
        })
    }

    /// Check if there are any pending paths.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Get the number of pending paths.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
