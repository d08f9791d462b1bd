//! Endpoint handlers and routing.
//!
//! Four endpoints share the dispatch pipeline:
//!
//! - `POST /api/conduit/query` (GET parity via query parameters) — one
//!   query, no batch logic, 404/408 surfaced directly.
//! - `POST /api/conduit/queries` — public batch; database named in the
//!   body; only publicly-visible queries resolve.
//! - `POST /api/conduit/auth_queries` — authenticated batch; the database
//!   comes from the validated token's claims, never the body.
//! - `GET /api/conduit/status` — per-database readiness snapshot.
//!
//! Early aborts (malformed body, auth failure, missing queries array)
//! return a flat error body; everything item-level is absorbed into the
//! batch results so the response array always matches the request array.

use conduit_protocol::{BatchResponse, StatusResponse};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::auth::{bearer_token, validate_and_extract_database, TokenValidator};
use crate::dispatch::Dispatcher;
use crate::respond::{batch_http_status, single_http_status};
use crate::transport::{ApiRequest, ApiResponse, Method};

/// The conduit REST service.
pub struct ConduitService {
    dispatcher: Dispatcher,
    validator: Arc<dyn TokenValidator>,
}

impl ConduitService {
    pub fn new(dispatcher: Dispatcher, validator: Arc<dyn TokenValidator>) -> Self {
        ConduitService {
            dispatcher,
            validator,
        }
    }

    /// Route one request to its handler.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        debug!(path = %request.path, "Handling API request");
        match (request.method, request.path.as_str()) {
            (Method::Get | Method::Post, "/api/conduit/query") => {
                self.handle_query(&request).await
            }
            (Method::Post, "/api/conduit/queries") => self.handle_queries(&request).await,
            (Method::Post, "/api/conduit/auth_queries") => {
                self.handle_auth_queries(&request).await
            }
            (Method::Get, "/api/conduit/status") => self.handle_status(),
            (
                _,
                "/api/conduit/query"
                | "/api/conduit/queries"
                | "/api/conduit/auth_queries"
                | "/api/conduit/status",
            ) => ApiResponse::error(405, "Method not allowed"),
            _ => ApiResponse::error(404, "Unknown endpoint"),
        }
    }

    /// Single-query endpoint: no dedup, no batch bookkeeping.
    async fn handle_query(&self, request: &ApiRequest) -> ApiResponse {
        let request_json = match request.method {
            Method::Post => match request.json_body() {
                Some(body) => body,
                None => return ApiResponse::error(400, "Invalid JSON in request body"),
            },
            _ => match query_request_from_params(request) {
                Ok(body) => body,
                Err(response) => return response,
            },
        };

        let Some(query_ref) = request_json
            .get("query_ref")
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
        else {
            return ApiResponse::error(400, "Missing required parameter: query_ref");
        };
        let Some(database) = request_json.get("database").and_then(Value::as_str) else {
            return ApiResponse::error(400, "Missing required parameter: database");
        };

        if self.dispatcher.manager().database(database).is_none() {
            return ApiResponse::error(400, "Invalid database");
        }

        let item = self
            .dispatcher
            .execute_query(database, query_ref, request_json.get("params"), false)
            .await;
        let status = single_http_status(&item);
        ApiResponse::json(status, serde_json::to_value(item).unwrap_or(Value::Null))
    }

    /// Public batch endpoint: database in the body, public queries only.
    async fn handle_queries(&self, request: &ApiRequest) -> ApiResponse {
        let Some(body) = request.json_body() else {
            return ApiResponse::error(400, "Invalid JSON in request body");
        };
        let Some(database) = body.get("database").and_then(Value::as_str) else {
            return ApiResponse::error(400, "Missing required parameter: database");
        };
        let Some(queries) = body.get("queries").and_then(Value::as_array) else {
            return ApiResponse::error(400, "Missing required parameter: queries (must be array)");
        };

        if queries.is_empty() {
            // An empty array is answered with a well-formed batch body.
            let response = BatchResponse {
                success: false,
                results: Vec::new(),
                database: database.to_string(),
                total_execution_time_ms: 0,
            };
            let mut value = serde_json::to_value(response).unwrap_or(Value::Null);
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "error".to_string(),
                    Value::from("Queries array cannot be empty"),
                );
            }
            return ApiResponse::json(200, value);
        }

        if self.dispatcher.manager().database(database).is_none() {
            return ApiResponse::error(400, "Invalid database");
        }

        self.run_batch(database, queries, true).await
    }

    /// Authenticated batch endpoint: database routed from token claims.
    async fn handle_auth_queries(&self, request: &ApiRequest) -> ApiResponse {
        let token = match bearer_token(request.header("authorization")) {
            Ok(token) => token,
            Err(err) => return ApiResponse::error(err.http_status(), err.to_string()),
        };
        let (_claims, database) =
            match validate_and_extract_database(self.validator.as_ref(), token) {
                Ok(found) => found,
                Err(err) => return ApiResponse::error(err.http_status(), err.to_string()),
            };

        let Some(body) = request.json_body() else {
            return ApiResponse::error(400, "Invalid JSON in request body");
        };
        let Some(queries) = body.get("queries").and_then(Value::as_array) else {
            return ApiResponse::error(400, "Missing required parameter: queries (must be array)");
        };
        if queries.is_empty() {
            return ApiResponse::error(400, "Queries array cannot be empty");
        }

        if self.dispatcher.manager().database(&database).is_none() {
            return ApiResponse::error(400, "Invalid database");
        }

        self.run_batch(&database, queries, false).await
    }

    async fn run_batch(
        &self,
        database: &str,
        queries: &[Value],
        require_public: bool,
    ) -> ApiResponse {
        let started = Instant::now();
        let outcome = match self
            .dispatcher
            .execute_batch(database, queries, require_public, true)
            .await
        {
            Ok(outcome) => outcome,
            // Unreachable with partial execution enabled; kept as the
            // whole-batch rejection surface.
            Err(_) => {
                return ApiResponse::error(
                    429,
                    "Rate limit exceeded: too many unique queries in request",
                )
            }
        };

        let status = batch_http_status(&outcome.results);
        let response = BatchResponse {
            success: outcome.all_success,
            results: outcome.results,
            database: database.to_string(),
            total_execution_time_ms: started.elapsed().as_millis() as i64,
        };
        ApiResponse::json(status, serde_json::to_value(response).unwrap_or(Value::Null))
    }

    /// Per-database status snapshot.
    fn handle_status(&self) -> ApiResponse {
        let response = StatusResponse {
            success: true,
            databases: self.dispatcher.manager().status_snapshot(),
        };
        ApiResponse::json(200, serde_json::to_value(response).unwrap_or(Value::Null))
    }
}

/// Build a single-query request object from GET query parameters.
fn query_request_from_params(request: &ApiRequest) -> Result<Value, ApiResponse> {
    let mut body = Map::new();
    if let Some(query_ref) = request.query_param("query_ref") {
        let parsed: i64 = query_ref
            .parse()
            .map_err(|_| ApiResponse::error(400, "Missing required parameter: query_ref"))?;
        body.insert("query_ref".to_string(), Value::from(parsed));
    }
    if let Some(database) = request.query_param("database") {
        body.insert("database".to_string(), Value::from(database));
    }
    if let Some(params) = request.query_param("params") {
        let parsed: Value = serde_json::from_str(&params)
            .map_err(|_| ApiResponse::error(400, "Invalid JSON in params parameter"))?;
        body.insert("params".to_string(), parsed);
    }
    Ok(Value::Object(body))
}
