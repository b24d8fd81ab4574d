//! Core projection trait and per-event outcomes.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// What a projection did with one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// Logged and folded into the current state.
    Applied,
    /// Already logged under the same event id; nothing changed.
    Duplicate,
    /// Logged, but older than the state already shown. Only untouched
    /// field groups were filled.
    Stale,
    /// Logged, but the kind or schema version is not understood.
    Unrecognized,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied => "applied",
            ApplyOutcome::Duplicate => "duplicate",
            ApplyOutcome::Stale => "stale",
            ApplyOutcome::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A projection that processes events and updates a read model.
///
/// Delivery is at least once and may be out of order, so `handle` must be
/// idempotent per event id and tolerate older sequences arriving late.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventEnvelope) -> Result<ApplyOutcome>;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
