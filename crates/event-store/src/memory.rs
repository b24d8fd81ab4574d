use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    EventEnvelope, EventStoreError, Result, Snapshot, SubmissionId, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// In-memory event store implementation for testing.
///
/// This implementation stores all events in memory and provides
/// the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    snapshots: Arc<RwLock<HashMap<SubmissionId, Snapshot>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        self.events.write().await.clear();
        self.snapshots.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let submission_id = first_event.submission_id;

        let mut store = self.events.write().await;

        let current_version = store
            .iter()
            .filter(|e| e.submission_id == submission_id)
            .map(|e| e.sequence)
            .max()
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                submission_id,
                expected,
                actual: current_version,
            });
        }

        // Unique (submission_id, sequence) simulation
        if first_event.sequence != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                submission_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        if let Some(duplicate) = events
            .iter()
            .find(|new| store.iter().any(|e| e.event_id == new.event_id))
        {
            return Err(EventStoreError::DuplicateEvent(duplicate.event_id));
        }

        let last_version = events
            .last()
            .map(|e| e.sequence)
            .unwrap_or(Version::initial());
        store.extend(events);

        Ok(last_version)
    }

    async fn get_events(&self, submission_id: SubmissionId) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.submission_id == submission_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn get_events_from_version(
        &self,
        submission_id: SubmissionId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.submission_id == submission_id && e.sequence >= from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        // Insertion order is commit order.
        let events = self.events.read().await.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_stream_version(&self, submission_id: SubmissionId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        let version = store
            .iter()
            .filter(|e| e.submission_id == submission_id)
            .map(|e| e.sequence)
            .max();
        Ok(version)
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.submission_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, submission_id: SubmissionId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&submission_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Actor, EventStoreExt};

    fn create_test_event(
        submission_id: SubmissionId,
        sequence: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .submission_id(submission_id)
            .aggregate_type("Submission")
            .event_type(event_type)
            .sequence(sequence)
            .actor(Actor::system())
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();
        let event = create_test_event(submission_id, Version::first(), "SubmissionCreated");

        let result = store.append(vec![event], AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::first());

        let events = store.get_events(submission_id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_multiple_events() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        let events = vec![
            create_test_event(submission_id, Version::new(1), "Event1"),
            create_test_event(submission_id, Version::new(2), "Event2"),
            create_test_event(submission_id, Version::new(3), "Event3"),
        ];

        let result = store.append(events, AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::new(3));

        let stored = store.get_events(submission_id).await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        let event1 = create_test_event(submission_id, Version::first(), "Event1");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(submission_id, Version::new(2), "Event2");
        let result = store
            .append(
                vec![event2],
                AppendOptions::expect_version(Version::initial()),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn append_with_correct_expected_version() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        let event1 = create_test_event(submission_id, Version::first(), "Event1");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(submission_id, Version::new(2), "Event2");
        let result = store
            .append(
                vec![event2],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn reused_sequence_without_expectation_conflicts() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        store
            .append(
                vec![create_test_event(submission_id, Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let result = store
            .append(
                vec![create_test_event(submission_id, Version::first(), "B")],
                AppendOptions::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_event_id_is_rejected() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();
        let first = create_test_event(submission_id, Version::first(), "A");
        let mut replay = create_test_event(submission_id, Version::new(2), "A");
        replay.event_id = first.event_id;

        store
            .append(vec![first.clone()], AppendOptions::new())
            .await
            .unwrap();
        let result = store.append(vec![replay], AppendOptions::new()).await;

        assert!(matches!(result, Err(EventStoreError::DuplicateEvent(id)) if id == first.event_id));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn get_events_from_version() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        let events = vec![
            create_test_event(submission_id, Version::new(1), "Event1"),
            create_test_event(submission_id, Version::new(2), "Event2"),
            create_test_event(submission_id, Version::new(3), "Event3"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let from_v2 = store
            .get_events_from_version(submission_id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(from_v2.len(), 2);
        assert_eq!(from_v2[0].sequence, Version::new(2));
        assert_eq!(from_v2[1].sequence, Version::new(3));
    }

    #[tokio::test]
    async fn snapshot_save_and_retrieve() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        let snapshot = Snapshot::new(
            submission_id,
            "Submission",
            Version::new(5),
            serde_json::json!({"state": "saved"}),
        );

        store.save_snapshot(snapshot.clone()).await.unwrap();

        let retrieved = store.get_snapshot(submission_id).await.unwrap().unwrap();
        assert_eq!(retrieved.submission_id, submission_id);
        assert_eq!(retrieved.version, Version::new(5));
    }

    #[tokio::test]
    async fn snapshot_not_found() {
        let store = InMemoryEventStore::new();
        let result = store.get_snapshot(SubmissionId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn load_stream_replays_only_events_after_snapshot() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        let events = vec![
            create_test_event(submission_id, Version::new(1), "Event1"),
            create_test_event(submission_id, Version::new(2), "Event2"),
            create_test_event(submission_id, Version::new(3), "Event3"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();
        store
            .save_snapshot(Snapshot::new(
                submission_id,
                "Submission",
                Version::new(2),
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        let (snapshot, tail) = store.load_stream(submission_id).await.unwrap();
        assert_eq!(snapshot.unwrap().version, Version::new(2));
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].sequence, Version::new(3));
    }

    #[tokio::test]
    async fn stream_all_events_in_commit_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let id1 = SubmissionId::new();
        let id2 = SubmissionId::new();

        store
            .append(
                vec![create_test_event(id1, Version::first(), "Event1")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(id2, Version::first(), "Event2")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let stream = store.stream_all_events().await.unwrap();
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().event_type, "Event1");
        assert_eq!(events[1].as_ref().unwrap().event_type, "Event2");
    }

    #[tokio::test]
    async fn get_stream_version() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();

        assert!(
            store
                .get_stream_version(submission_id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!store.submission_exists(submission_id).await.unwrap());

        let events = vec![
            create_test_event(submission_id, Version::new(1), "Event1"),
            create_test_event(submission_id, Version::new(2), "Event2"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let version = store.get_stream_version(submission_id).await.unwrap();
        assert_eq!(version, Some(Version::new(2)));
        assert!(store.submission_exists(submission_id).await.unwrap());
    }
}
