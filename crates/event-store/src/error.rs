use thiserror::Error;

use crate::{EventId, SubmissionId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream moved since the writer read it.
    #[error(
        "Concurrency conflict for submission {submission_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        submission_id: SubmissionId,
        expected: Version,
        actual: Version,
    },

    /// An event with this ID was already appended.
    #[error("Duplicate event id: {0}")]
    DuplicateEvent(EventId),

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
