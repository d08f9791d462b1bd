//! Per-query execution and concurrent batch dispatch.
//!
//! `execute_query` is the full single-query path: cache lookup, ordered
//! parameter validation, conversion, queue selection, pending
//! registration, submission, and the bounded wait. Every failure becomes a
//! synthetic result item; nothing here ever aborts a sibling query.
//!
//! `execute_batch` runs unique queries as independent tasks and joins them
//! before remapping — a deliberate departure from a sequential
//! submit-then-wait loop, since queries are logically independent once
//! submitted. Final ordering is governed purely by the dedup index maps.

use conduit_dqm::{PendingRegistry, QueryIdGenerator, QueueManager, SubmittedQuery, WaitOutcome};
use conduit_protocol::{
    check_missing_parameters, check_unused_parameters, convert_named_to_positional,
    group_parameters, parse_typed_parameters, validate_parameter_types, ErrorClass, ParamError,
    QueryResultItem,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::dedup::{
    deduplicate_queries, partial_execution_prefix, DedupOutcome, DedupRejection,
};
use crate::respond;

/// A fully-remapped batch: one result per original item, in order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<QueryResultItem>,
    pub all_success: bool,
}

/// Executes queries against the queue manager.
#[derive(Clone)]
pub struct Dispatcher {
    manager: Arc<QueueManager>,
    pending: Arc<PendingRegistry>,
    ids: Arc<QueryIdGenerator>,
}

impl Dispatcher {
    pub fn new(manager: Arc<QueueManager>, pending: Arc<PendingRegistry>) -> Self {
        Dispatcher {
            manager,
            pending,
            ids: Arc::new(QueryIdGenerator::new()),
        }
    }

    pub fn manager(&self) -> &Arc<QueueManager> {
        &self.manager
    }

    /// Execute one raw batch item, tolerating malformed shapes.
    pub async fn execute_item(
        &self,
        database: &str,
        item: &Value,
        require_public: bool,
    ) -> QueryResultItem {
        let query_ref = item
            .as_object()
            .and_then(|obj| obj.get("query_ref"))
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok());

        let Some(query_ref) = query_ref else {
            return QueryResultItem::failure(
                ErrorClass::Validation,
                "Missing required field: query_ref",
            )
            .with_database(database);
        };

        self.execute_query(database, query_ref, item.get("params"), require_public)
            .await
    }

    /// The per-query execution path.
    pub async fn execute_query(
        &self,
        database: &str,
        query_ref: i32,
        params: Option<&Value>,
        require_public: bool,
    ) -> QueryResultItem {
        let Some(runtime) = self.manager.database(database) else {
            return QueryResultItem::failure(ErrorClass::Validation, "Database not available")
                .with_query_ref(query_ref)
                .with_database(database)
                .with_message("Database is not available");
        };

        let entry = if require_public {
            runtime.cache.lookup_public(query_ref)
        } else {
            runtime.cache.lookup(query_ref)
        };
        let Some(entry) = entry else {
            let error = if require_public {
                "Public query not found"
            } else {
                "Query not found"
            };
            return QueryResultItem::failure(ErrorClass::NotFound, error)
                .with_query_ref(query_ref)
                .with_database(database);
        };

        // Type mismatches are reported before missing parameters, both
        // before conversion.
        if let Err(ParamError::TypeMismatch { detail }) = validate_parameter_types(params) {
            return QueryResultItem::failure(ErrorClass::Validation, "Parameter type mismatch")
                .with_query_ref(query_ref)
                .with_database(database)
                .with_message(detail);
        }

        let param_list = match parse_typed_parameters(params) {
            Ok(list) => list,
            Err(err) => {
                return QueryResultItem::failure(
                    ErrorClass::Validation,
                    "Parameter processing failed",
                )
                .with_query_ref(query_ref)
                .with_database(database)
                .with_message(err.to_string());
            }
        };

        if let Err(ParamError::MissingParameters { detail }) =
            check_missing_parameters(&entry.sql_template, &param_list)
        {
            return QueryResultItem::failure(ErrorClass::Validation, "Missing parameters")
                .with_query_ref(query_ref)
                .with_database(database)
                .with_message(detail);
        }

        let bound =
            match convert_named_to_positional(&entry.sql_template, &param_list, runtime.engine) {
                Ok(bound) => bound,
                Err(err) => {
                    warn!(query_ref, error = %err, "Parameter conversion failed past validation");
                    return QueryResultItem::failure(
                        ErrorClass::Validation,
                        "Parameter processing failed",
                    )
                    .with_query_ref(query_ref)
                    .with_database(database)
                    .with_message(err.to_string());
                }
            };

        let advisory = check_unused_parameters(&entry.sql_template, &param_list);

        let Some(queue) = runtime.select_queue(entry.queue_type) else {
            return QueryResultItem::failure(
                ErrorClass::Unavailable,
                "No suitable queue available",
            )
            .with_query_ref(query_ref)
            .with_database(database);
        };

        let query_id = self.ids.next();
        let pending = match self.pending.register(&query_id, entry.timeout_seconds) {
            Ok(pending) => pending,
            Err(err) => {
                error!(query_id, error = %err, "Pending registration failed");
                return QueryResultItem::failure(
                    ErrorClass::Internal,
                    "Failed to register pending result",
                )
                .with_query_ref(query_ref)
                .with_database(database);
            }
        };

        let submitted = SubmittedQuery {
            query_id: query_id.clone(),
            sql: bound.sql.clone(),
            parameter_json: group_parameters(&bound.ordered),
            queue_kind: queue.kind(),
            timeout_seconds: entry.timeout_seconds,
            submitted_at: chrono::Utc::now(),
        };

        // Submission failure never reaches the wait; the converted SQL,
        // parameter list, and pending handle are all dropped here.
        if let Err(err) = queue.submit(submitted) {
            error!(query_id, error = %err, "Query submission failed");
            return QueryResultItem::failure(ErrorClass::Internal, "Failed to submit query")
                .with_query_ref(query_ref)
                .with_database(database);
        }

        debug!(query_id, query_ref, queue = %queue.kind(), "Query submitted");

        let outcome = pending.wait().await;
        match &outcome {
            WaitOutcome::Resolved(result) if result.success && result.error_message.is_none() => {
                respond::build_success_item(query_ref, entry, result, queue.kind(), advisory)
            }
            other => respond::build_wait_error_item(query_ref, database, entry, other, advisory),
        }
    }

    /// Deduplicate, rate-limit, execute concurrently, and remap a batch.
    ///
    /// With `partial_execute`, a rate-limited batch still runs its prefix
    /// (see [`partial_execution_prefix`]); otherwise the rejection is
    /// returned for the caller to surface as a whole-batch 429.
    pub async fn execute_batch(
        &self,
        database: &str,
        items: &[Value],
        require_public: bool,
        partial_execute: bool,
    ) -> Result<BatchOutcome, DedupRejection> {
        // A database with no attached runtime skips rate limiting; each
        // item will fail its own lookup instead.
        let limit = self
            .manager
            .database(database)
            .map(|runtime| runtime.max_queries_per_request)
            .unwrap_or(usize::MAX);

        let (outcome, rate_limit) = match deduplicate_queries(items, limit) {
            Ok(outcome) => (outcome, None),
            Err(rejection) if !partial_execute => return Err(rejection),
            Err(DedupRejection::RateLimit { unique_count, .. }) => {
                warn!(
                    database,
                    unique_count, limit, "Rate limit exceeded, executing prefix"
                );
                (partial_execution_prefix(items, limit), Some(limit))
            }
        };

        debug!(
            database,
            original = items.len(),
            unique = outcome.unique.len(),
            "Batch deduplicated"
        );

        let unique_results = self
            .execute_unique(database, items, &outcome, require_public)
            .await;

        let mut results = Vec::with_capacity(items.len());
        for index in 0..items.len() {
            let item = if rate_limit.map_or(false, |limit| index >= limit) {
                respond::rate_limit_item(rate_limit.unwrap_or_default())
            } else if outcome.is_duplicate[index] {
                respond::duplicate_item()
            } else if let Some(result) = unique_results.get(outcome.mapping[index]) {
                result.clone()
            } else {
                respond::invalid_mapping_item()
            };
            results.push(item);
        }

        let all_success = results.iter().all(|item| item.success);
        Ok(BatchOutcome {
            results,
            all_success,
        })
    }

    /// Run every unique query as its own task and join them all.
    ///
    /// One failed or panicked task never aborts its siblings; a panic
    /// degrades to a generic execution failure for that slot only.
    async fn execute_unique(
        &self,
        database: &str,
        items: &[Value],
        outcome: &DedupOutcome,
        require_public: bool,
    ) -> Vec<QueryResultItem> {
        let mut join_set = JoinSet::new();
        for (unique_index, unique) in outcome.unique.iter().enumerate() {
            let dispatcher = self.clone();
            let database = database.to_string();
            let item = items[unique.first_index].clone();
            join_set.spawn(async move {
                let result = dispatcher
                    .execute_item(&database, &item, require_public)
                    .await;
                (unique_index, result)
            });
        }

        let mut results: Vec<QueryResultItem> = vec![
            QueryResultItem::failure(ErrorClass::Execution, "Query execution failed");
            outcome.unique.len()
        ];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((unique_index, result)) => results[unique_index] = result,
                Err(err) => error!(error = %err, "Query task failed to join"),
            }
        }
        results
    }
}
