//! Terminal-resize notification.
//!
//! A resize arrives asynchronously (SIGWINCH on Unix) and must not touch
//! document or line state from the signal context. The handler only sets
//! this flag; the main loop consumes it between input reads and then
//! relayouts and redraws on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A pending-resize flag, safe to set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct PendingResize {
    flag: Arc<AtomicBool>,
}

impl PendingResize {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a resize happened. Async-signal-safe: a single relaxed
    /// atomic store, no allocation, no locks.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Consume the flag, returning whether a resize was pending.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }

    /// Peek without consuming.
    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
