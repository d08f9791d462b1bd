//! Conduit REST layer: query dispatch and coordination.
//!
//! Sits between an HTTP transport (consumed as an abstract
//! request/response pair, never owned here) and the database queue
//! manager. The pipeline per batch request:
//!
//! parse body → authenticate (when required) → deduplicate by
//! (query_ref, params) → enforce the per-database rate limit → execute
//! each unique query concurrently (cache lookup, parameter conversion,
//! queue selection, pending registration, submission, bounded wait) →
//! remap results onto the original request order → derive the aggregate
//! HTTP status.
//!
//! Unique queries run as independent tasks joined before remapping; final
//! ordering is governed purely by the deduplication index maps, never by
//! completion order.

pub mod auth;
pub mod dedup;
pub mod dispatch;
pub mod respond;
pub mod service;
pub mod transport;

pub use auth::{bearer_token, AuthError, Claims, StaticTokenValidator, TokenValidator};
pub use dedup::{deduplicate_queries, partial_execution_prefix, DedupOutcome, DedupRejection};
pub use dispatch::{BatchOutcome, Dispatcher};
pub use respond::{batch_http_status, single_http_status};
pub use service::ConduitService;
pub use transport::{ApiRequest, ApiResponse, Method};
