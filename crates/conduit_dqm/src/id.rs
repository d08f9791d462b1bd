//! Query ID generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique query IDs: a monotonic counter plus a unix timestamp.
///
/// The counter alone guarantees uniqueness within a process lifetime; the
/// timestamp makes IDs readable in logs and distinguishes restarts.
#[derive(Debug, Default)]
pub struct QueryIdGenerator {
    counter: AtomicU64,
}

impl QueryIdGenerator {
    pub fn new() -> Self {
        QueryIdGenerator::default()
    }

    pub fn next(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("conduit_{}_{}", id, chrono::Utc::now().timestamp())
    }
}
