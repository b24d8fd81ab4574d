//! Projection error types.

use std::time::Duration;

use common::SubmissionId;
use thiserror::Error;

/// Errors that can occur during projection processing and queries.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The read store could not apply the change. Safe to retry.
    #[error("Apply error: {0}")]
    Apply(String),

    /// Another writer committed to the same row first. Safe to retry.
    #[error("Conflict on submission {submission_id}: row revision {expected} is no longer current")]
    Conflict {
        submission_id: SubmissionId,
        expected: u64,
    },

    /// Failed to deserialize an event payload. Retrying cannot help.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A query did not finish in time.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The worker pool has been shut down.
    #[error("Projector pool is shut down")]
    PoolClosed,
}

impl ProjectionError {
    /// Returns true if the same envelope may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProjectionError::Apply(_)
                | ProjectionError::Conflict { .. }
                | ProjectionError::EventStore(_)
        )
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
