//! Projection processor for feeding events from the store to projections.

use std::sync::Arc;

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use serde::Serialize;

use crate::{ProjectionError, Result};
use crate::projection::{ApplyOutcome, Projection};

/// Tally of one catch-up run, summed over all projections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatchUpReport {
    pub events_read: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub unrecognized: u64,
    /// Logged, but their payload could not be decoded.
    pub undecodable: u64,
}

impl CatchUpReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::Duplicate => self.duplicates += 1,
            ApplyOutcome::Stale => self.stale += 1,
            ApplyOutcome::Unrecognized => self.unrecognized += 1,
        }
    }
}

/// Replays the event store into projections.
///
/// The store stays the source of truth for the read side: anything the bus
/// lost can be recovered by a catch-up, and a rebuild recreates every view
/// from scratch. Projections drop envelopes they have already logged, so a
/// catch-up may overlap freely with live delivery.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams every stored event through every projection.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<CatchUpReport> {
        let mut stream = self.store.stream_all_events().await?;
        let mut report = CatchUpReport::default();

        while let Some(result) = stream.next().await {
            let event = result?;
            report.events_read += 1;

            for projection in &self.projections {
                match projection.handle(&event).await {
                    Ok(outcome) => report.record(outcome),
                    Err(err @ ProjectionError::Deserialization(_)) => {
                        tracing::error!(
                            projection = projection.name(),
                            event_id = %event.event_id,
                            error = %err,
                            "skipping undecodable event"
                        );
                        report.undecodable += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        tracing::info!(
            events_read = report.events_read,
            applied = report.applied,
            duplicates = report.duplicates,
            "catch-up complete"
        );

        Ok(report)
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<Vec<ApplyOutcome>> {
        let mut outcomes = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            outcomes.push(projection.handle(event).await?);
        }
        Ok(outcomes)
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<CatchUpReport> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
