//! Database Queue Manager.
//!
//! Owns everything between the dispatch pipeline and the database engines:
//! the per-database query table cache, the per-database work queues and
//! their worker tasks, queue selection, the pending-result registry, and
//! query-ID generation. The engines themselves sit behind the
//! [`QueryExecutor`] trait; this crate never speaks SQL wire protocols.
//!
//! Concurrency model: dispatch tasks block only in
//! [`PendingQuery::wait`]; worker tasks resolve pending entries exactly
//! once, and a resolve that loses the race against a timeout is silently
//! discarded.

pub mod cache;
pub mod error;
pub mod executor;
pub mod id;
pub mod manager;
pub mod pending;
pub mod queue;

pub use cache::{QueryCache, QueryCacheEntry};
pub use error::DqmError;
pub use executor::{FixtureExecutor, QueryExecutor};
pub use id::QueryIdGenerator;
pub use manager::{DatabaseRuntime, QueueManager};
pub use pending::{PendingQuery, PendingRegistry, QueryResult, WaitOutcome};
pub use queue::{DatabaseQueue, SubmittedQuery};
