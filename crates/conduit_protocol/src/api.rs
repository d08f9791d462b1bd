//! JSON shapes for the conduit REST surface.
//!
//! One [`QueryResultItem`] is produced per submitted batch item, success or
//! not; the batch response array always matches the request array in length
//! and order. The `error` field carries the fatal failure kind while
//! `message` carries advisory detail; the two are never folded together.

use crate::types::QueueKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Classification of a failed (or duplicate) result item.
///
/// Never serialized; drives aggregate HTTP status derivation. The order
/// here is not the priority order, see `batch_http_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Item beyond the rate-limit execution prefix.
    RateLimit,
    /// Parameter/validation failure, including database-not-found.
    Validation,
    /// Authentication or authorization failure.
    Auth,
    /// Query reference unknown or not public.
    NotFound,
    /// Internal failure (registration, submission, mapping).
    Internal,
    /// Worker-reported database error.
    Execution,
    /// Execution timeout. Aggregates like an execution error; the
    /// single-query endpoint maps it to 408 instead.
    Timeout,
    /// No queue available for the requested kind.
    Unavailable,
    /// Structurally-identical query collapsed within the batch.
    Duplicate,
}

/// One entry in a batch `results` array (or the whole single-query body).
#[derive(Debug, Clone, Serialize, Default)]
pub struct QueryResultItem {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_ref: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
    #[serde(skip)]
    pub class: Option<ErrorClass>,
}

impl QueryResultItem {
    /// A failed item tagged with its aggregate classification.
    pub fn failure(class: ErrorClass, error: impl Into<String>) -> Self {
        QueryResultItem {
            success: false,
            error: Some(error.into()),
            class: Some(class),
            ..QueryResultItem::default()
        }
    }

    pub fn with_query_ref(mut self, query_ref: i32) -> Self {
        self.query_ref = Some(query_ref);
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_queue(mut self, kind: QueueKind) -> Self {
        self.queue_used = Some(kind.to_string());
        self
    }
}

/// Batch endpoint response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<QueryResultItem>,
    pub database: String,
    pub total_execution_time_ms: i64,
}

/// Early-abort error body (malformed request, auth failure, rate reject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorBody {
            success: false,
            error: error.into(),
        }
    }
}

/// Per-database section of the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStatus {
    pub ready: bool,
    pub migration_status: String,
    pub query_cache_entries: usize,
    pub last_checked: String,
}

/// `GET /api/conduit/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub databases: BTreeMap<String, DatabaseStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_items_omit_absent_fields() {
        let item = QueryResultItem::failure(ErrorClass::NotFound, "Query not found")
            .with_query_ref(42)
            .with_database("main");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["query_ref"], 42);
        assert_eq!(json["error"], "Query not found");
        assert!(json.get("rows").is_none());
        assert!(json.get("class").is_none());
    }

    #[test]
    fn error_body_serializes_flat() {
        let body = serde_json::to_value(ErrorBody::new("Invalid database")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid database");
    }
}
