//! Process-wide count of failed page fetches.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared by every worker; increments are atomic.
#[derive(Debug, Default)]
pub struct ErrorCounter {
    failed_fetches: AtomicU64,
}

impl ErrorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed fetch and return the new total.
    pub fn record(&self) -> u64 {
        self.failed_fetches.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self) -> u64 {
        self.failed_fetches.load(Ordering::Relaxed)
    }
}
