//! End-to-end dispatch tests through the REST service.
//!
//! Exercises the full pipeline — routing, auth, dedup, rate limiting,
//! concurrent execution, remapping, status derivation — against fixture
//! executors, with no transport underneath.

use conduit_api::{ApiRequest, Claims, ConduitService, Dispatcher, StaticTokenValidator};
use conduit_dqm::{FixtureExecutor, PendingRegistry, QueryResult, QueueManager};
use conduit_protocol::{DatabaseConfig, EngineType, QueryDefinition, QueueKind};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn query(query_ref: i32, sql: &str, queue: QueueKind, public: bool) -> QueryDefinition {
    QueryDefinition {
        query_ref,
        sql: sql.to_string(),
        queue,
        timeout_seconds: None,
        description: format!("query {}", query_ref),
        public,
    }
}

fn database_config(limit: usize) -> DatabaseConfig {
    DatabaseConfig {
        connection_name: "main".to_string(),
        enabled: true,
        engine: EngineType::Sqlite,
        max_queries_per_request: limit,
        queues: vec![QueueKind::Slow, QueueKind::Fast],
        workers_per_queue: 2,
        default_timeout_seconds: 5,
        queries: vec![
            query(1, "SELECT * FROM users WHERE id = :id", QueueKind::Fast, true),
            query(2, "SELECT count(*) FROM users", QueueKind::Slow, true),
            QueryDefinition {
                timeout_seconds: Some(0),
                ..query(5, "SELECT slow_scan()", QueueKind::Slow, true)
            },
            query(9, "DELETE FROM audit", QueueKind::Fast, false),
        ],
    }
}

struct Harness {
    service: ConduitService,
    executor: Arc<FixtureExecutor>,
}

fn harness_with(limit: usize, executor: FixtureExecutor) -> Harness {
    let executor = Arc::new(executor);
    let manager = Arc::new(QueueManager::new());
    let pending = Arc::new(PendingRegistry::new());
    manager
        .attach_database(
            &database_config(limit),
            Arc::clone(&executor) as Arc<dyn conduit_dqm::QueryExecutor>,
            Arc::clone(&pending),
        )
        .unwrap();

    let validator = StaticTokenValidator::new()
        .with_token(
            "valid-token",
            Claims {
                subject: "svc".to_string(),
                database: Some("main".to_string()),
                expires_at: None,
            },
        )
        .with_token(
            "scopeless-token",
            Claims {
                subject: "svc".to_string(),
                database: None,
                expires_at: None,
            },
        );

    Harness {
        service: ConduitService::new(Dispatcher::new(manager, pending), Arc::new(validator)),
        executor,
    }
}

fn harness(limit: usize) -> Harness {
    harness_with(
        limit,
        FixtureExecutor::ok().with_response(
            "SELECT * FROM users WHERE id = ?",
            QueryResult::ok("[{\"id\":5}]", 1, 1).with_execution_time(2),
        ),
    )
}

fn batch_request(items: Value) -> ApiRequest {
    ApiRequest::post(
        "/api/conduit/queries",
        &json!({"database": "main", "queries": items}),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_batch_executes_each_unique_query_once() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(batch_request(json!([
            {"query_ref": 1, "params": {"INTEGER": {"id": 5}}},
            {"query_ref": 1, "params": {"INTEGER": {"id": 5}}},
            {"query_ref": 2}
        ])))
        .await;

    assert_eq!(response.status, 200);
    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["error"], "Duplicate query");
    assert_eq!(results[2]["success"], true);

    // Two unique queries reached the executor, not three.
    assert_eq!(harness.executor.executed().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_database_is_a_400_not_404() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(ApiRequest::post(
            "/api/conduit/query",
            &json!({"query_ref": 1, "database": "unknown_db"}),
        ))
        .await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "Invalid database");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_query_ref_is_404_on_the_single_endpoint() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(ApiRequest::post(
            "/api/conduit/query",
            &json!({"query_ref": 12345, "database": "main"}),
        ))
        .await;

    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], "Query not found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_authorization_header_is_401() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(ApiRequest::post(
            "/api/conduit/auth_queries",
            &json!({"queries": [{"query_ref": 1}]}),
        ))
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(response.body["success"], false);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Authentication required"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_without_database_claim_is_401() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(
            ApiRequest::post(
                "/api/conduit/auth_queries",
                &json!({"queries": [{"query_ref": 1}]}),
            )
            .with_header("Authorization", "Bearer scopeless-token"),
        )
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(
        response.body["error"],
        "JWT token missing database information"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auth_queries_routes_database_from_claims() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(
            ApiRequest::post(
                "/api/conduit/auth_queries",
                &json!({"queries": [
                    {"query_ref": 1, "params": {"INTEGER": {"id": 5}}},
                    {"query_ref": 9}
                ]}),
            )
            .with_header("Authorization", "Bearer valid-token"),
        )
        .await;

    // The database never appears in the body; it comes from the token.
    assert_eq!(response.body["database"], "main");
    assert!(response.body["total_execution_time_ms"].is_i64());

    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    // Private queries resolve on the authenticated endpoint.
    assert_eq!(results[1]["success"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn private_queries_are_hidden_from_the_public_batch() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(batch_request(json!([{"query_ref": 9}])))
        .await;

    assert_eq!(response.status, 404);
    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results[0]["error"], "Public query not found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rate_limited_batch_partially_executes_and_returns_429() {
    let harness = harness(2);
    let items: Vec<Value> = (0..4)
        .map(|i| json!({"query_ref": 1, "params": {"INTEGER": {"id": i}}}))
        .collect();
    let response = harness
        .service
        .handle(batch_request(Value::Array(items)))
        .await;

    assert_eq!(response.status, 429);
    assert_eq!(response.body["success"], false);
    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], true);
    assert_eq!(results[2]["error"], "Rate limit exceeded");
    assert_eq!(
        results[2]["message"],
        "Query limit of 2 unique queries per request exceeded"
    );
    assert_eq!(results[3]["error"], "Rate limit exceeded");

    // Only the prefix reached the executor.
    assert_eq!(harness.executor.executed().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rate_limit_dominates_other_error_classes_in_aggregate() {
    let harness = harness(1);
    // Prefix executes an unknown reference (404-class); the overflow item
    // is rate-limited (429-class). 429 must win.
    let response = harness
        .service
        .handle(batch_request(json!([
            {"query_ref": 999},
            {"query_ref": 1, "params": {"INTEGER": {"id": 1}}}
        ])))
        .await;

    assert_eq!(response.status, 429);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validation_errors_beat_execution_errors_in_aggregate() {
    let harness = harness_with(
        10,
        FixtureExecutor::ok()
            .with_response("SELECT count(*) FROM users", QueryResult::error("broken")),
    );
    let response = harness
        .service
        .handle(batch_request(json!([
            {"query_ref": 2},
            {"query_ref": 1}
        ])))
        .await;

    // Item 0 is an execution error (422-class); item 1 is missing its
    // required parameter (400-class). 400 wins.
    assert_eq!(response.status, 400);
    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results[0]["error"], "Database error");
    assert_eq!(results[1]["error"], "Missing parameters");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_timeout_maps_to_408_on_the_single_endpoint() {
    let harness = harness_with(
        10,
        FixtureExecutor::ok().with_delay(Duration::from_millis(150)),
    );
    let response = harness
        .service
        .handle(ApiRequest::post(
            "/api/conduit/query",
            &json!({"query_ref": 5, "database": "main"}),
        ))
        .await;

    assert_eq!(response.status, 408);
    assert_eq!(response.body["error"], "Query execution timeout");
    assert_eq!(response.body["timeout_seconds"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_timeout_aggregates_as_422_in_a_batch() {
    let harness = harness_with(
        10,
        FixtureExecutor::ok().with_delay(Duration::from_millis(150)),
    );
    let response = harness
        .service
        .handle(batch_request(json!([{"query_ref": 5}])))
        .await;

    assert_eq!(response.status, 422);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_endpoint_reports_every_attached_database() {
    let harness = harness(10);
    let response = harness
        .service
        .handle(ApiRequest::get("/api/conduit/status"))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body["success"], true);
    let main = &response.body["databases"]["main"];
    assert_eq!(main["ready"], true);
    assert_eq!(main["migration_status"], "current");
    assert_eq!(main["query_cache_entries"], 4);
    assert!(main["last_checked"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_order_matches_request_order_despite_mixed_queues() {
    let harness = harness(10);
    // Slow-queue and fast-queue queries interleaved; the response order
    // must match the request order, not completion order.
    let response = harness
        .service
        .handle(batch_request(json!([
            {"query_ref": 2},
            {"query_ref": 1, "params": {"INTEGER": {"id": 7}}},
            {"query_ref": 2, "params": {}},
            {"query_ref": 1, "params": {"INTEGER": {"id": 8}}}
        ])))
        .await;

    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["query_ref"], 2);
    assert_eq!(results[1]["query_ref"], 1);
    // Omitted params and explicit {} are the same query.
    assert_eq!(results[2]["error"], "Duplicate query");
    assert_eq!(results[3]["query_ref"], 1);
}
