//! Response and error assembly.
//!
//! Pure functions, no I/O, no shared state. Every batch item becomes a
//! [`QueryResultItem`]; the aggregate HTTP status is the single worst
//! classification present, in the priority order
//! 429 > 400 > 401 > 404 > 500 > 422 > 503 > 200. Duplicates alone never
//! push a batch off 200.

use conduit_dqm::{QueryCacheEntry, QueryResult, WaitOutcome};
use conduit_protocol::{ErrorClass, QueryResultItem, QueueKind};
use serde_json::Value;

/// Parse a result's serialized row data, or fall back to an empty array.
fn parse_rows(result: &QueryResult) -> Value {
    result
        .data_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

/// A completed, successful query.
///
/// Requires `result.success` and no worker error message; callers route
/// anything else through [`build_wait_error_item`].
pub fn build_success_item(
    query_ref: i32,
    entry: &QueryCacheEntry,
    result: &QueryResult,
    queue_used: QueueKind,
    advisory: Option<String>,
) -> QueryResultItem {
    let mut item = QueryResultItem {
        success: true,
        query_ref: Some(query_ref),
        description: Some(entry.description.clone()),
        rows: Some(parse_rows(result)),
        row_count: Some(result.row_count),
        column_count: Some(result.column_count),
        execution_time_ms: Some(result.execution_time_ms),
        queue_used: Some(queue_used.to_string()),
        ..QueryResultItem::default()
    };
    if let Some(message) = advisory.filter(|m| !m.is_empty()) {
        item.message = Some(message);
    }
    item
}

/// A query whose wait ended without a clean success.
///
/// Error priority: timeout first (with the entry's timeout budget), then
/// the worker-reported database error, then the generic execution failure.
pub fn build_wait_error_item(
    query_ref: i32,
    database: &str,
    entry: &QueryCacheEntry,
    outcome: &WaitOutcome,
    advisory: Option<String>,
) -> QueryResultItem {
    let mut item = match outcome {
        WaitOutcome::TimedOut => {
            let mut item = QueryResultItem::failure(ErrorClass::Timeout, "Query execution timeout");
            item.timeout_seconds = Some(entry.timeout_seconds);
            item
        }
        WaitOutcome::Resolved(result) if result.error_message.is_some() => {
            QueryResultItem::failure(ErrorClass::Execution, "Database error")
                .with_message(result.error_message.clone().unwrap_or_default())
        }
        _ => QueryResultItem::failure(ErrorClass::Execution, "Query execution failed"),
    };
    item.query_ref = Some(query_ref);
    item.database = Some(database.to_string());
    if item.message.is_none() {
        item.message = advisory.filter(|m| !m.is_empty());
    }
    item
}

/// Synthetic entry for a duplicate batch item.
pub fn duplicate_item() -> QueryResultItem {
    QueryResultItem::failure(ErrorClass::Duplicate, "Duplicate query")
}

/// Synthetic entry for an item beyond the rate-limit execution prefix.
pub fn rate_limit_item(limit: usize) -> QueryResultItem {
    QueryResultItem::failure(ErrorClass::RateLimit, "Rate limit exceeded").with_message(format!(
        "Query limit of {} unique queries per request exceeded",
        limit
    ))
}

/// Defensive entry for an index map pointing outside the unique results.
pub fn invalid_mapping_item() -> QueryResultItem {
    QueryResultItem::failure(ErrorClass::Internal, "Internal error: invalid query mapping")
}

fn class_weight(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::RateLimit => 7,
        ErrorClass::Validation => 6,
        ErrorClass::Auth => 5,
        ErrorClass::NotFound => 4,
        ErrorClass::Internal => 3,
        ErrorClass::Execution | ErrorClass::Timeout => 2,
        ErrorClass::Unavailable => 1,
        ErrorClass::Duplicate => 0,
    }
}

fn class_status(class: ErrorClass) -> u16 {
    match class {
        ErrorClass::RateLimit => 429,
        ErrorClass::Validation => 400,
        ErrorClass::Auth => 401,
        ErrorClass::NotFound => 404,
        ErrorClass::Internal => 500,
        ErrorClass::Execution | ErrorClass::Timeout => 422,
        ErrorClass::Unavailable => 503,
        ErrorClass::Duplicate => 200,
    }
}

/// Aggregate status for a batch: the single worst classification present.
pub fn batch_http_status(results: &[QueryResultItem]) -> u16 {
    let worst = results
        .iter()
        .filter(|item| !item.success)
        .filter_map(|item| item.class)
        .max_by_key(|class| class_weight(*class));

    match worst {
        Some(ErrorClass::Duplicate) | None => 200,
        Some(class) => class_status(class),
    }
}

/// Status for the single-query endpoint, where timeout surfaces as 408.
pub fn single_http_status(item: &QueryResultItem) -> u16 {
    if item.success {
        return 200;
    }
    match item.class {
        Some(ErrorClass::Timeout) => 408,
        Some(class) => class_status(class),
        None => 400,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> QueryCacheEntry {
        QueryCacheEntry {
            query_ref: 1,
            sql_template: "SELECT 1".to_string(),
            queue_type: QueueKind::Fast,
            timeout_seconds: 30,
            description: "probe".to_string(),
            public: true,
        }
    }

    #[test]
    fn success_item_carries_rows_and_metadata() {
        let result = QueryResult::ok("[{\"id\":1}]", 1, 1).with_execution_time(12);
        let item = build_success_item(1, &entry(), &result, QueueKind::Fast, None);
        assert!(item.success);
        assert_eq!(item.rows.as_ref().unwrap()[0]["id"], 1);
        assert_eq!(item.execution_time_ms, Some(12));
        assert_eq!(item.queue_used.as_deref(), Some("fast"));
    }

    #[test]
    fn unparseable_row_data_degrades_to_empty_array() {
        let result = QueryResult::ok("not json", 0, 0);
        let item = build_success_item(1, &entry(), &result, QueueKind::Fast, None);
        assert_eq!(item.rows, Some(Value::Array(Vec::new())));
    }

    #[test]
    fn timeout_takes_precedence_over_worker_error() {
        let item =
            build_wait_error_item(1, "main", &entry(), &WaitOutcome::TimedOut, None);
        assert_eq!(item.error.as_deref(), Some("Query execution timeout"));
        assert_eq!(item.timeout_seconds, Some(30));

        let failed = WaitOutcome::Resolved(QueryResult::error("bad relation"));
        let item = build_wait_error_item(1, "main", &entry(), &failed, None);
        assert_eq!(item.error.as_deref(), Some("Database error"));
        assert_eq!(item.message.as_deref(), Some("bad relation"));

        let abandoned = WaitOutcome::Abandoned;
        let item = build_wait_error_item(1, "main", &entry(), &abandoned, None);
        assert_eq!(item.error.as_deref(), Some("Query execution failed"));
    }

    #[test]
    fn rate_limit_dominates_every_other_class() {
        let results = vec![
            QueryResultItem::failure(ErrorClass::NotFound, "Query not found"),
            rate_limit_item(5),
            QueryResultItem::failure(ErrorClass::Execution, "Database error"),
        ];
        assert_eq!(batch_http_status(&results), 429);
    }

    #[test]
    fn validation_outranks_execution_errors() {
        let results = vec![
            QueryResultItem::failure(ErrorClass::Execution, "Database error"),
            QueryResultItem::failure(ErrorClass::Validation, "Missing parameters"),
        ];
        assert_eq!(batch_http_status(&results), 400);
    }

    #[test]
    fn duplicates_and_successes_stay_200() {
        let results = vec![
            QueryResultItem {
                success: true,
                ..QueryResultItem::default()
            },
            duplicate_item(),
        ];
        assert_eq!(batch_http_status(&results), 200);
    }

    #[test]
    fn single_endpoint_maps_timeout_to_408() {
        let item = build_wait_error_item(1, "main", &entry(), &WaitOutcome::TimedOut, None);
        assert_eq!(single_http_status(&item), 408);

        let failed = WaitOutcome::Resolved(QueryResult::error("boom"));
        let item = build_wait_error_item(1, "main", &entry(), &failed, None);
        assert_eq!(single_http_status(&item), 422);
    }
}
