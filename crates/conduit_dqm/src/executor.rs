//! The database engine seam.
//!
//! Workers hand each submitted query to a [`QueryExecutor`]; what happens
//! behind it (a connection pool, a wire protocol, a test fixture) is not
//! this crate's concern. [`FixtureExecutor`] is the in-repo implementation
//! used by tests and by `serve` until an engine adapter is attached.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::pending::QueryResult;
use crate::queue::SubmittedQuery;

/// Executes one submitted query against a database engine.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &SubmittedQuery) -> QueryResult;
}

/// Canned-response executor.
///
/// Responses are keyed by SQL text; anything unmatched gets the default
/// result. An optional artificial delay makes timeout paths testable.
pub struct FixtureExecutor {
    responses: HashMap<String, QueryResult>,
    default: QueryResult,
    delay: Option<Duration>,
    executed: Mutex<Vec<SubmittedQuery>>,
}

impl FixtureExecutor {
    /// Every query succeeds with an empty row set.
    pub fn ok() -> Self {
        FixtureExecutor {
            responses: HashMap::new(),
            default: QueryResult::ok("[]", 0, 0).with_execution_time(1),
            delay: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Every query fails with a worker-reported error.
    pub fn failing(message: impl Into<String>) -> Self {
        FixtureExecutor {
            default: QueryResult::error(message),
            ..FixtureExecutor::ok()
        }
    }

    /// Pin a response for one SQL text.
    pub fn with_response(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.responses.insert(sql.into(), result);
        self
    }

    /// Sleep before producing each result.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every query executed so far, in execution order.
    pub fn executed(&self) -> Vec<SubmittedQuery> {
        self.executed.lock().expect("fixture lock poisoned").clone()
    }
}

#[async_trait]
impl QueryExecutor for FixtureExecutor {
    async fn execute(&self, query: &SubmittedQuery) -> QueryResult {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executed
            .lock()
            .expect("fixture lock poisoned")
            .push(query.clone());
        self.responses
            .get(&query.sql)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
