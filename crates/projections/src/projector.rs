//! The event projector: keeps the event log and current-state view in step
//! with the event stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use event_store::EventEnvelope;
use serde::Serialize;

use crate::{ProjectionError, Result};
use crate::adapter::adapt;
use crate::projection::{ApplyOutcome, Projection};
use crate::read_store::{CommitOutcome, ReadModelStore};
use crate::views::{Absorbed, CurrentStateRow, EventLogRow};

/// Counters for each outcome the projector has produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectorStats {
    pub applied: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub unrecognized: u64,
}

impl ProjectorStats {
    /// Envelopes that reached the event log.
    pub fn logged(&self) -> u64 {
        self.applied + self.stale + self.unrecognized
    }
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    duplicates: AtomicU64,
    stale: AtomicU64,
    unrecognized: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: ApplyOutcome) {
        let counter = match outcome {
            ApplyOutcome::Applied => &self.applied,
            ApplyOutcome::Duplicate => &self.duplicates,
            ApplyOutcome::Stale => &self.stale,
            ApplyOutcome::Unrecognized => &self.unrecognized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProjectorStats {
        ProjectorStats {
            applied: self.applied.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
        }
    }
}

/// Applies envelopes to the event log and the current-state view.
///
/// Each envelope is handled as one read-modify-commit cycle: check the log for
/// its id, fold it into the submission's row (creating a shell row on first
/// sight), then commit the log entry and the row together. A failed commit
/// writes nothing, so the same envelope can simply be applied again.
pub struct EventProjector<R: ReadModelStore> {
    store: R,
    counters: Arc<Counters>,
}

impl<R: ReadModelStore> EventProjector<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the underlying read store.
    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn stats(&self) -> ProjectorStats {
        self.counters.snapshot()
    }

    /// Applies one envelope.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            submission_id = %envelope.submission_id,
            event_type = %envelope.event_type,
            sequence = %envelope.sequence,
        )
    )]
    pub async fn apply(&self, envelope: &EventEnvelope) -> Result<ApplyOutcome> {
        let started = Instant::now();

        let outcome = self.apply_inner(envelope).await?;

        self.counters.record(outcome);
        metrics::histogram!("projector_apply_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match outcome {
            ApplyOutcome::Applied => {
                metrics::counter!(
                    "projector_events_applied_total",
                    "event_type" => envelope.event_type.clone()
                )
                .increment(1);
            }
            ApplyOutcome::Duplicate => {
                metrics::counter!("projector_duplicates_total").increment(1);
                tracing::debug!(event_id = %envelope.event_id, "duplicate delivery dropped");
            }
            ApplyOutcome::Stale => {
                metrics::counter!("projector_stale_total").increment(1);
                tracing::info!("event older than current state, only missing details filled");
            }
            ApplyOutcome::Unrecognized => {
                tracing::warn!(
                    schema_version = envelope.schema_version,
                    "event kept in log but not understood"
                );
            }
        }

        Ok(outcome)
    }

    async fn apply_inner(&self, envelope: &EventEnvelope) -> Result<ApplyOutcome> {
        if self.store.has_event(envelope.event_id).await? {
            return Ok(ApplyOutcome::Duplicate);
        }

        let change = match adapt(envelope) {
            Ok(change) => change,
            Err(err @ ProjectionError::Deserialization(_)) => {
                // The fact is kept even though its payload cannot be read.
                self.log_only(envelope).await?;
                tracing::warn!(error = %err, "event logged but payload could not be decoded");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let mut row = self.load_or_shell(envelope).await?;
        let expected_revision = row.revision;

        let outcome = match change {
            Some(change) => match row.absorb(change, envelope.sequence, envelope.timestamp) {
                Absorbed::Advanced => ApplyOutcome::Applied,
                Absorbed::Stale => ApplyOutcome::Stale,
            },
            None => ApplyOutcome::Unrecognized,
        };

        let entry = EventLogRow::from_envelope(envelope);
        match self.store.commit(entry, row, expected_revision).await? {
            CommitOutcome::Committed => Ok(outcome),
            CommitOutcome::Duplicate => Ok(ApplyOutcome::Duplicate),
        }
    }

    async fn load_or_shell(&self, envelope: &EventEnvelope) -> Result<CurrentStateRow> {
        Ok(self
            .store
            .load_row(envelope.submission_id)
            .await?
            .unwrap_or_else(|| CurrentStateRow::shell(envelope.submission_id, envelope.timestamp)))
    }

    /// Commits the log entry with the row left as it was.
    async fn log_only(&self, envelope: &EventEnvelope) -> Result<()> {
        let row = self.load_or_shell(envelope).await?;
        let expected_revision = row.revision;
        self.store
            .commit(EventLogRow::from_envelope(envelope), row, expected_revision)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<R: ReadModelStore> Projection for EventProjector<R> {
    fn name(&self) -> &'static str {
        "SubmissionProjector"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<ApplyOutcome> {
        self.apply(event).await
    }

    async fn reset(&self) -> Result<()> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_store::InMemoryReadStore;
    use chrono::{DateTime, Utc};
    use common::{Actor, ActorRole, SubmissionId, UserId};
    use domain::{ArtifactRef, DomainEvent, Modality, Participant, Participants, SubmissionEvent};
    use event_store::Version;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn envelope(id: SubmissionId, sequence: i64, event: &SubmissionEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .submission_id(id)
            .aggregate_type("Submission")
            .event_type(event.event_type())
            .sequence(Version::new(sequence))
            .timestamp(at(sequence * 60))
            .actor(Actor::new(1, "Carlos Pérez", ActorRole::Director))
            .payload(event)
            .unwrap()
            .build()
    }

    fn created(id: SubmissionId) -> SubmissionEvent {
        SubmissionEvent::submission_created(
            id,
            "Detección de plagas",
            Modality::Investigacion,
            Participants::new(
                Participant::new(1, "Carlos Pérez"),
                Participant::new(10, "Ana Torres"),
            ),
            ArtifactRef::new("mem://1/fa.pdf"),
            None,
        )
    }

    #[tokio::test]
    async fn applies_in_order() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();

        let first = projector.apply(&envelope(id, 1, &created(id))).await.unwrap();
        let second = projector
            .apply(&envelope(id, 2, &SubmissionEvent::formato_a_presented(1)))
            .await
            .unwrap();

        assert_eq!(first, ApplyOutcome::Applied);
        assert_eq!(second, ApplyOutcome::Applied);

        let row = projector.store().load_row(id).await.unwrap().unwrap();
        assert_eq!(row.state, "PresentedToCoordinator");
        assert_eq!(row.last_applied_sequence, Version::new(2));
        assert_eq!(projector.store().event_count().await, 2);
    }

    #[tokio::test]
    async fn second_delivery_is_a_duplicate() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();
        let event = envelope(id, 1, &created(id));

        projector.apply(&event).await.unwrap();
        let before = projector.store().load_row(id).await.unwrap().unwrap();
        let outcome = projector.apply(&event).await.unwrap();
        let after = projector.store().load_row(id).await.unwrap().unwrap();

        assert_eq!(outcome, ApplyOutcome::Duplicate);
        assert_eq!(before, after);
        assert_eq!(projector.store().event_count().await, 1);
        assert_eq!(projector.stats().duplicates, 1);
    }

    #[tokio::test]
    async fn late_event_is_stale_but_logged() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();

        projector
            .apply(&envelope(id, 2, &SubmissionEvent::formato_a_presented(1)))
            .await
            .unwrap();
        let outcome = projector.apply(&envelope(id, 1, &created(id))).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Stale);
        let row = projector.store().load_row(id).await.unwrap().unwrap();
        assert_eq!(row.state, "PresentedToCoordinator");
        assert_eq!(row.details.get().unwrap().title, "Detección de plagas");
        assert_eq!(projector.store().event_count().await, 2);
    }

    #[tokio::test]
    async fn unknown_event_creates_shell_only() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();
        let unknown = EventEnvelope::builder()
            .submission_id(id)
            .aggregate_type("Submission")
            .event_type("SubmissionArchived")
            .sequence(Version::new(4))
            .actor(Actor::system())
            .payload_raw(serde_json::json!({"type": "SubmissionArchived", "data": {}}))
            .build();

        let outcome = projector.apply(&unknown).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Unrecognized);
        let row = projector.store().load_row(id).await.unwrap().unwrap();
        assert!(row.is_shell());
        assert_eq!(row.last_applied_sequence, Version::initial());
        assert_eq!(projector.store().event_log(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_payload_is_logged_without_touching_the_view() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();
        let broken = EventEnvelope::builder()
            .submission_id(id)
            .aggregate_type("Submission")
            .event_type("EvaluatorsAssigned")
            .sequence(Version::new(6))
            .actor(Actor::system())
            .payload_raw(serde_json::json!({"type": "EvaluatorsAssigned", "data": {}}))
            .build();

        projector.apply(&envelope(id, 1, &created(id))).await.unwrap();
        let before = projector.store().load_row(id).await.unwrap().unwrap();

        let err = projector.apply(&broken).await.unwrap_err();
        assert!(matches!(err, ProjectionError::Deserialization(_)));
        assert!(!err.is_transient());

        let log = projector.store().event_log(id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().any(|entry| entry.event_id == broken.event_id));

        let after = projector.store().load_row(id).await.unwrap().unwrap();
        assert!(before.same_view(&after));
        assert_eq!(after.last_applied_sequence, Version::new(1));

        // Redelivery finds the fact already logged.
        assert_eq!(
            projector.apply(&broken).await.unwrap(),
            ApplyOutcome::Duplicate
        );
        assert_eq!(projector.store().event_count().await, 2);
    }

    #[tokio::test]
    async fn bad_payload_on_unseen_submission_leaves_a_shell() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();
        let broken = EventEnvelope::builder()
            .submission_id(id)
            .aggregate_type("Submission")
            .event_type("FormatoAPresented")
            .sequence(Version::new(2))
            .actor(Actor::system())
            .payload_raw(serde_json::json!({"type": "FormatoAPresented", "data": {"intento": "uno"}}))
            .build();

        assert!(projector.apply(&broken).await.is_err());

        let row = projector.store().load_row(id).await.unwrap().unwrap();
        assert!(row.is_shell());
        assert_eq!(row.last_applied_sequence, Version::initial());
        assert_eq!(projector.store().event_log(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_commit_can_be_retried() {
        let store = InMemoryReadStore::new();
        let projector = EventProjector::new(store.clone());
        let id = SubmissionId::new();
        let event = envelope(id, 1, &created(id));

        store.fail_next_commits(1).await;
        assert!(projector.apply(&event).await.unwrap_err().is_transient());
        assert_eq!(store.event_count().await, 0);

        assert_eq!(projector.apply(&event).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn evaluators_fill_in_from_either_direction() {
        let projector = EventProjector::new(InMemoryReadStore::new());
        let id = SubmissionId::new();
        let assigned = envelope(
            id,
            6,
            &SubmissionEvent::evaluators_assigned(UserId::new(7), UserId::new(9)),
        );
        let evaluated = envelope(
            id,
            7,
            &SubmissionEvent::anteproyecto_evaluated(true, None, UserId::new(7)),
        );

        projector.apply(&evaluated).await.unwrap();
        projector.apply(&assigned).await.unwrap();

        let row = projector.store().load_row(id).await.unwrap().unwrap();
        assert_eq!(row.state, "AnteproyectoApproved");
        assert_eq!(
            row.evaluators.get(),
            Some(&(UserId::new(7), UserId::new(9)))
        );
        assert_eq!(row.created_at, at(6 * 60));
        assert_eq!(row.updated_at, at(7 * 60));
    }
}
