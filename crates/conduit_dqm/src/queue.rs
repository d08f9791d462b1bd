//! Per-database work queues.
//!
//! Each (database, kind) pair owns one unbounded channel drained by a
//! dispatcher task; concurrent executions are bounded by a semaphore sized
//! to the configured worker count. Workers resolve the pending-result
//! registry when the executor finishes; submission itself never blocks.

use chrono::{DateTime, Utc};
use conduit_protocol::QueueKind;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use crate::error::DqmError;
use crate::executor::QueryExecutor;
use crate::pending::PendingRegistry;

/// One query handed to a work queue.
#[derive(Debug, Clone)]
pub struct SubmittedQuery {
    pub query_id: String,
    pub sql: String,
    /// Type-sectioned parameter object, the wire shape engines consume.
    pub parameter_json: Option<Value>,
    pub queue_kind: QueueKind,
    pub timeout_seconds: i64,
    pub submitted_at: DateTime<Utc>,
}

/// A running work queue for one (database, kind) pair.
pub struct DatabaseQueue {
    database: String,
    kind: QueueKind,
    tx: mpsc::UnboundedSender<SubmittedQuery>,
    depth: Arc<AtomicUsize>,
}

impl DatabaseQueue {
    /// Spawn the queue's dispatcher task and return the submit handle.
    pub fn spawn(
        database: impl Into<String>,
        kind: QueueKind,
        workers: usize,
        executor: Arc<dyn QueryExecutor>,
        pending: Arc<PendingRegistry>,
    ) -> Arc<Self> {
        let database = database.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<SubmittedQuery>();
        let depth = Arc::new(AtomicUsize::new(0));

        let queue = Arc::new(DatabaseQueue {
            database: database.clone(),
            kind,
            tx,
            depth: Arc::clone(&depth),
        });

        let permits = Arc::new(Semaphore::new(workers.max(1)));
        tokio::spawn(async move {
            info!(database = %database, kind = %kind, workers, "Queue worker pool started");
            while let Some(query) = rx.recv().await {
                let permit = Arc::clone(&permits)
                    .acquire_owned()
                    .await
                    .expect("queue semaphore closed");
                let executor = Arc::clone(&executor);
                let pending = Arc::clone(&pending);
                let depth = Arc::clone(&depth);
                tokio::spawn(async move {
                    debug!(query_id = %query.query_id, "Executing query");
                    let result = executor.execute(&query).await;
                    depth.fetch_sub(1, Ordering::Relaxed);
                    pending.resolve(&query.query_id, result);
                    drop(permit);
                });
            }
            info!(database = %database, kind = %kind, "Queue worker pool stopped");
        });

        queue
    }

    /// Enqueue a query. Fails only when the worker pool is gone.
    pub fn submit(&self, query: SubmittedQuery) -> Result<(), DqmError> {
        self.depth.fetch_add(1, Ordering::Relaxed);
        self.tx.send(query).map_err(|err| {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            DqmError::SubmitFailed(format!(
                "queue {}/{} is closed: {}",
                self.database, self.kind, err
            ))
        })
    }

    /// Queries enqueued or executing right now.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}
