//! Domain error types.

use common::SubmissionId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::ports::PortError;
use crate::submission::SubmissionError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The submission rejected the operation.
    #[error("Submission error: {0}")]
    Submission(SubmissionError),

    /// Another writer changed the stream since it was read.
    #[error(
        "Concurrency conflict for submission {submission_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        submission_id: SubmissionId,
        expected: Version,
        actual: Version,
    },

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    /// A collaborator port failed.
    #[error("Port error: {0}")]
    Port(#[from] PortError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if re-reading the submission and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::ConcurrencyConflict { .. })
    }
}

impl From<EventStoreError> for DomainError {
    fn from(e: EventStoreError) -> Self {
        match e {
            EventStoreError::ConcurrencyConflict {
                submission_id,
                expected,
                actual,
            } => DomainError::ConcurrencyConflict {
                submission_id,
                expected,
                actual,
            },
            other => DomainError::EventStore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_become_domain_conflicts() {
        let err: DomainError = EventStoreError::ConcurrencyConflict {
            submission_id: SubmissionId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert!(err.is_conflict());

        let err: DomainError = EventStoreError::InvalidAppend("empty".into()).into();
        assert!(matches!(err, DomainError::EventStore(_)));
    }
}
