//! Cooperative quit flag for the blocking adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag asking a [`BlockingTransport`](super::BlockingTransport) loop
/// to stop.
///
/// The loop checks the flag before every read. A read already blocked is not
/// interrupted; it finishes when data arrives, the peer closes, or the
/// configured poll interval elapses.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle {
    flag: Arc<AtomicBool>,
}

impl QuitHandle {
    /// Create a handle with the flag cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at its next iteration.
    pub fn request_quit(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a quit was requested.
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
