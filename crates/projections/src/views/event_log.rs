//! Event log: an append-only copy of every envelope the projector has seen.

use chrono::{DateTime, Utc};
use common::{Actor, SubmissionId};
use event_store::{EventEnvelope, EventId, Version};
use serde::{Deserialize, Serialize};

/// One logged event. `event_id` is unique across the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogRow {
    pub event_id: EventId,
    pub submission_id: SubmissionId,
    pub event_type: String,
    pub schema_version: u16,
    pub sequence: Version,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub payload: serde_json::Value,
}

impl EventLogRow {
    pub fn from_envelope(envelope: &EventEnvelope) -> Self {
        Self {
            event_id: envelope.event_id,
            submission_id: envelope.submission_id,
            event_type: envelope.event_type.clone(),
            schema_version: envelope.schema_version,
            sequence: envelope.sequence,
            timestamp: envelope.timestamp,
            actor: envelope.actor.clone(),
            payload: envelope.payload.clone(),
        }
    }
}
