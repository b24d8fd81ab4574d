use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{EventEnvelope, EventStoreError, Result, Snapshot, SubmissionId, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the stream for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stream to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the stream to be empty (new submission).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to one submission stream.
    ///
    /// Events are appended atomically - either all succeed or none do.
    /// If `options.expected_version` is set, the operation fails with
    /// `ConcurrencyConflict` when the stream's current version differs.
    ///
    /// Returns the stream version after appending.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Retrieves all events of a submission in sequence order.
    async fn get_events(&self, submission_id: SubmissionId) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events of a submission with `sequence >= from_version`.
    ///
    /// Used when replaying on top of a snapshot.
    async fn get_events_from_version(
        &self,
        submission_id: SubmissionId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams every event in the store in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Gets the current version of a submission stream.
    ///
    /// Returns None if the stream doesn't exist.
    async fn get_stream_version(&self, submission_id: SubmissionId) -> Result<Option<Version>>;

    /// Saves a snapshot, replacing any previous one for the submission.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the latest snapshot for a submission.
    async fn get_snapshot(&self, submission_id: SubmissionId) -> Result<Option<Snapshot>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if a submission stream exists (has any events).
    async fn submission_exists(&self, submission_id: SubmissionId) -> Result<bool> {
        Ok(self.get_stream_version(submission_id).await?.is_some())
    }

    /// Loads a stream, starting from the latest snapshot when there is one.
    ///
    /// Returns the snapshot (if any) and the events recorded after it.
    async fn load_stream(
        &self,
        submission_id: SubmissionId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(submission_id).await? {
            let events = self
                .get_events_from_version(submission_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events(submission_id).await?;
            Ok((None, events))
        }
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending.
///
/// A batch must be non-empty, target one submission and carry consecutive
/// sequence numbers.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append empty event list".to_string(),
        ));
    };

    for event in events.iter().skip(1) {
        if event.submission_id != first.submission_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same submission".to_string(),
            ));
        }
    }

    let mut expected_sequence = first.sequence;
    for event in events.iter().skip(1) {
        expected_sequence = expected_sequence.next();
        if event.sequence != expected_sequence {
            return Err(EventStoreError::InvalidAppend(format!(
                "event sequences must be consecutive: expected {}, got {}",
                expected_sequence, event.sequence
            )));
        }
    }

    Ok(())
}
