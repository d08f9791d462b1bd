//! Error types for the queue manager.

use conduit_protocol::QueueKind;
use thiserror::Error;

/// Queue manager errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DqmError {
    /// No enabled database connection with this name.
    #[error("Database not available: {0}")]
    DatabaseNotFound(String),

    /// The database exists but the reference is unknown (or not public
    /// when public visibility was required).
    #[error("Query {query_ref} not found in database {database}")]
    QueryNotFound { database: String, query_ref: i32 },

    /// No queue of any kind could be selected for this database.
    #[error("No suitable queue available for database {database} ({kind})")]
    NoQueueAvailable { database: String, kind: QueueKind },

    /// The selected queue's worker side is gone.
    #[error("Failed to submit query to queue: {0}")]
    SubmitFailed(String),

    /// A pending entry with this ID already exists.
    #[error("Failed to register pending result: {0}")]
    RegisterFailed(String),
}
