//! Pending-result registry.
//!
//! The single cross-thread synchronization point of the whole pipeline:
//! one dispatch task blocks in [`PendingQuery::wait`], one worker task
//! resolves the entry. Resolution is at-most-once; resolving twice, or
//! resolving after the waiter timed out, is a silent no-op so the benign
//! race between timeout expiry and late completion never corrupts state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::DqmError;

/// Result of one executed query, produced by a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub success: bool,
    pub data_json: Option<String>,
    pub row_count: i64,
    pub column_count: i64,
    pub execution_time_ms: i64,
    pub error_message: Option<String>,
}

impl QueryResult {
    /// A successful result carrying serialized row data.
    pub fn ok(data_json: impl Into<String>, row_count: i64, column_count: i64) -> Self {
        QueryResult {
            success: true,
            data_json: Some(data_json.into()),
            row_count,
            column_count,
            execution_time_ms: 0,
            error_message: None,
        }
    }

    /// A worker-reported failure.
    pub fn error(message: impl Into<String>) -> Self {
        QueryResult {
            success: false,
            data_json: None,
            row_count: 0,
            column_count: 0,
            execution_time_ms: 0,
            error_message: Some(message.into()),
        }
    }

    pub fn with_execution_time(mut self, millis: i64) -> Self {
        self.execution_time_ms = millis;
        self
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The worker resolved the entry in time.
    Resolved(QueryResult),
    /// The timeout elapsed first; a late resolve will be discarded.
    TimedOut,
    /// The resolver side disappeared without resolving.
    Abandoned,
}

impl WaitOutcome {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// Process-wide table of in-flight queries keyed by query ID.
#[derive(Default)]
pub struct PendingRegistry {
    waiters: Mutex<HashMap<String, oneshot::Sender<QueryResult>>>,
    registered_total: AtomicU64,
    resolved_total: AtomicU64,
}

impl PendingRegistry {
    pub fn new() -> Self {
        PendingRegistry::default()
    }

    /// Create a waitable entry for `query_id`.
    ///
    /// Fails if an entry with the same ID is already in flight; IDs are
    /// process-unique so this only fires on a generator misuse.
    pub fn register(
        self: &Arc<Self>,
        query_id: &str,
        timeout_seconds: i64,
    ) -> Result<PendingQuery, DqmError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.lock();
            if waiters.contains_key(query_id) {
                return Err(DqmError::RegisterFailed(format!(
                    "duplicate query id {}",
                    query_id
                )));
            }
            waiters.insert(query_id.to_string(), tx);
        }
        self.registered_total.fetch_add(1, Ordering::Relaxed);
        debug!(query_id, timeout_seconds, "Pending result registered");

        Ok(PendingQuery {
            query_id: query_id.to_string(),
            timeout: Duration::from_secs(timeout_seconds.max(0) as u64),
            receiver: Some(rx),
            registry: Arc::clone(self),
        })
    }

    /// Resolve an in-flight entry. At-most-once: unknown IDs, repeated
    /// calls, and post-timeout calls all return `false` without effect.
    pub fn resolve(&self, query_id: &str, result: QueryResult) -> bool {
        let sender = self.lock().remove(query_id);
        match sender {
            Some(tx) => {
                self.resolved_total.fetch_add(1, Ordering::Relaxed);
                // A dropped receiver means the waiter gave up between
                // eviction and send; the result is simply discarded.
                let _ = tx.send(result);
                true
            }
            None => {
                debug!(query_id, "Resolve for unknown or already-settled query");
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn registered_total(&self) -> u64 {
        self.registered_total.load(Ordering::Relaxed)
    }

    pub fn resolved_total(&self) -> u64 {
        self.resolved_total.load(Ordering::Relaxed)
    }

    fn evict(&self, query_id: &str) {
        self.lock().remove(query_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<QueryResult>>> {
        self.waiters.lock().expect("pending registry lock poisoned")
    }
}

/// One in-flight query's waitable handle. Consumed by `wait`; a handle
/// dropped without waiting (a failed submission) evicts its entry.
pub struct PendingQuery {
    query_id: String,
    timeout: Duration,
    receiver: Option<oneshot::Receiver<QueryResult>>,
    registry: Arc<PendingRegistry>,
}

impl PendingQuery {
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Block until the worker resolves this entry or the timeout elapses.
    ///
    /// On timeout the entry is evicted so the table does not leak and a
    /// late resolve becomes a no-op.
    pub async fn wait(mut self) -> WaitOutcome {
        let receiver = self.receiver.take().expect("pending query waited twice");
        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => WaitOutcome::Resolved(result),
            Ok(Err(_)) => {
                warn!(query_id = %self.query_id, "Pending result abandoned by resolver");
                WaitOutcome::Abandoned
            }
            Err(_) => {
                warn!(query_id = %self.query_id, "Query execution timeout");
                WaitOutcome::TimedOut
            }
        }
    }
}

impl Drop for PendingQuery {
    // Covers every exit: a resolved entry is already gone, a timed-out or
    // never-waited one must not linger in the table.
    fn drop(&mut self) {
        self.registry.evict(&self.query_id);
    }
}
