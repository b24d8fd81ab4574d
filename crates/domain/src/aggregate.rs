//! Core aggregate and domain event traits.

use common::SubmissionId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is stored on the envelope and used by consumers for routing.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates in an event-sourced system.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Generate events from commands
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<SubmissionId>;

    /// Returns the current version of the aggregate.
    ///
    /// Version starts at 0 for a new aggregate and increments with each event.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the command handler after loading events.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not have side effects
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Trait for aggregates that support snapshotting.
///
/// The aggregate exports a plain record of its state and is restored from it
/// through [`SnapshotCapable::rehydrate`], which validates the record instead
/// of trusting it.
pub trait SnapshotCapable: Aggregate {
    /// Serializable record of the aggregate's state.
    type Snapshot: Serialize + DeserializeOwned + Send + Sync;

    /// Returns the snapshot interval (number of events between snapshots).
    fn snapshot_interval() -> usize {
        100
    }

    /// Returns whether a snapshot should be taken given the current version.
    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }

    /// Exports the current state. Returns None for an uninitialized aggregate.
    fn to_snapshot(&self) -> Option<Self::Snapshot>;

    /// Restores an aggregate from a snapshot taken at `version`.
    fn rehydrate(snapshot: Self::Snapshot, version: Version) -> Result<Self, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { id: SubmissionId },
        Updated { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        id: Option<SubmissionId>,
        value: i32,
        version: Version,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct TestSnapshot {
        id: SubmissionId,
        value: i32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct TestError;

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn id(&self) -> Option<SubmissionId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { id } => self.id = Some(id),
                TestEvent::Updated { value } => self.value = value,
            }
        }
    }

    impl SnapshotCapable for TestAggregate {
        type Snapshot = TestSnapshot;

        fn to_snapshot(&self) -> Option<TestSnapshot> {
            self.id.map(|id| TestSnapshot {
                id,
                value: self.value,
            })
        }

        fn rehydrate(snapshot: TestSnapshot, version: Version) -> Result<Self, TestError> {
            if snapshot.value < 0 {
                return Err(TestError);
            }
            Ok(Self {
                id: Some(snapshot.id),
                value: snapshot.value,
                version,
            })
        }
    }

    #[test]
    fn apply_events_in_order() {
        let mut aggregate = TestAggregate::default();
        aggregate.apply_events(vec![
            TestEvent::Created {
                id: SubmissionId::new(),
            },
            TestEvent::Updated { value: 42 },
        ]);

        assert!(aggregate.id().is_some());
        assert_eq!(aggregate.value, 42);
    }

    #[test]
    fn domain_event_type() {
        assert_eq!(TestEvent::Updated { value: 1 }.event_type(), "TestUpdated");
    }

    #[test]
    fn snapshot_interval() {
        let mut aggregate = TestAggregate::default();
        assert!(!aggregate.should_snapshot());

        aggregate.set_version(Version::new(100));
        assert!(aggregate.should_snapshot());

        aggregate.set_version(Version::new(101));
        assert!(!aggregate.should_snapshot());
    }

    #[test]
    fn rehydrate_round_trip_and_rejection() {
        let mut aggregate = TestAggregate::default();
        assert!(aggregate.to_snapshot().is_none());

        aggregate.apply(TestEvent::Created {
            id: SubmissionId::new(),
        });
        aggregate.apply(TestEvent::Updated { value: 7 });

        let snapshot = aggregate.to_snapshot().unwrap();
        let restored = TestAggregate::rehydrate(snapshot, Version::new(2)).unwrap();
        assert_eq!(restored.value, 7);
        assert_eq!(restored.version(), Version::new(2));

        let bad = TestSnapshot {
            id: SubmissionId::new(),
            value: -1,
        };
        assert!(TestAggregate::rehydrate(bad, Version::new(1)).is_err());
    }
}
