//! Command handling infrastructure.

use std::marker::PhantomData;
use std::sync::Arc;

use common::{Actor, SubmissionId};
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;
use crate::publisher::{EventPublisher, NoopPublisher};

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The committed envelopes, in stream order.
    pub envelopes: Vec<EventEnvelope>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the submission this command targets.
    fn submission_id(&self) -> SubmissionId;

    /// Who issues the command.
    fn actor(&self) -> &Actor;

    /// Stream version the caller based the command on, if any.
    fn expected_version(&self) -> Option<Version> {
        None
    }
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate from the event store (with optional snapshot)
/// 2. Executing the command to produce events
/// 3. Persisting the events with optimistic concurrency
/// 4. Saving a snapshot when the interval is reached
/// 5. Publishing the committed events
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    store: S,
    publisher: Arc<dyn EventPublisher>,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
    DomainError: From<A::Error>,
{
    /// Creates a new command handler with the given event store.
    ///
    /// Committed events are not published anywhere until a publisher is set.
    pub fn new(store: S) -> Self {
        Self {
            store,
            publisher: Arc::new(NoopPublisher),
            _phantom: PhantomData,
        }
    }

    /// Sets the publisher that receives committed events.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the stream doesn't exist, returns a default instance. A snapshot that
    /// fails validation is reported as an error rather than silently replaced.
    pub async fn load(&self, submission_id: SubmissionId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_stream(submission_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => {
                let version = snapshot.version;
                let state: A::Snapshot = snapshot.into_state()?;
                A::rehydrate(state, version)?
            }
            None => A::default(),
        };

        // Apply events after snapshot
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.sequence);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, submission_id: SubmissionId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(submission_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. When `expected_version`
    /// is given and the stream has moved past it, nothing is decided and a
    /// `ConcurrencyConflict` is returned.
    #[tracing::instrument(
        skip(self, actor, command_fn),
        fields(aggregate_type = A::aggregate_type(), actor_id = %actor.id)
    )]
    pub async fn execute<F>(
        &self,
        submission_id: SubmissionId,
        actor: &Actor,
        expected_version: Option<Version>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let mut aggregate = self.load(submission_id).await?;
        let current_version = aggregate.version();

        if let Some(expected) = expected_version
            && expected != current_version
        {
            return Err(DomainError::ConcurrencyConflict {
                submission_id,
                expected,
                actual: current_version,
            });
        }

        // Execute command to get events
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                envelopes: vec![],
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(submission_id, actor, current_version, &events)?;

        // Persist events with optimistic concurrency
        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.store.append(envelopes.clone(), options).await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        if aggregate.should_snapshot() {
            self.save_snapshot(submission_id, &aggregate, new_version)
                .await;
        }

        self.publish(&envelopes).await;

        Ok(CommandResult {
            aggregate,
            events,
            envelopes,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        submission_id: SubmissionId,
        actor: &Actor,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut sequence = current_version;

        for event in events {
            sequence = sequence.next();
            let envelope = EventEnvelope::builder()
                .submission_id(submission_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .sequence(sequence)
                .actor(actor.clone())
                .payload(event)?
                .build();
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }

    /// Snapshot failures only cost replay time, so they are logged and dropped.
    async fn save_snapshot(&self, submission_id: SubmissionId, aggregate: &A, version: Version) {
        let Some(state) = aggregate.to_snapshot() else {
            return;
        };

        let snapshot =
            match Snapshot::from_state(submission_id, A::aggregate_type(), version, &state) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(%submission_id, %version, error = %e, "failed to encode snapshot");
                    return;
                }
            };

        if let Err(e) = self.store.save_snapshot(snapshot).await {
            tracing::warn!(%submission_id, %version, error = %e, "failed to save snapshot");
        }
    }

    async fn publish(&self, envelopes: &[EventEnvelope]) {
        for envelope in envelopes {
            match self.publisher.publish(envelope).await {
                Ok(()) => metrics::counter!("events_published_total").increment(1),
                Err(e) => {
                    metrics::counter!("event_publish_failures_total").increment(1);
                    tracing::warn!(
                        submission_id = %envelope.submission_id,
                        event_type = %envelope.event_type,
                        sequence = %envelope.sequence,
                        error = %e,
                        "committed event could not be published"
                    );
                }
            }
        }
    }
}
