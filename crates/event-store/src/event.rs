use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Actor, SubmissionId};

/// Schema version stamped on envelopes produced by this build.
///
/// Consumers compare it against the highest version they understand before
/// interpreting a payload.
pub const CURRENT_SCHEMA_VERSION: u16 = 1;

/// Stable identifier of one event; the read side's idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Position of an event within its submission stream.
///
/// Sequences start at 1 for the first event and grow by 1 per event. The
/// current sequence of a stream doubles as its optimistic concurrency token;
/// 0 means "no events yet".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of an empty stream (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the sequence of the first event (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A committed domain event together with everything needed to store,
/// publish and project it.
///
/// Envelopes are immutable once appended. The same shape travels through the
/// store, the bus and the read side's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The kind of the event (e.g., "FormatoAEvaluated").
    pub event_type: String,

    /// Version of the payload schema.
    pub schema_version: u16,

    /// The submission stream this event belongs to.
    pub submission_id: SubmissionId,

    /// The type of aggregate that produced it (e.g., "Submission").
    pub aggregate_type: String,

    /// Per-submission sequence number.
    pub sequence: Version,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// Who caused the event.
    pub actor: Actor,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata (correlation ids and the like).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    schema_version: Option<u16>,
    submission_id: Option<SubmissionId>,
    aggregate_type: Option<String>,
    sequence: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    actor: Option<Actor>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the schema version. Defaults to [`CURRENT_SCHEMA_VERSION`].
    pub fn schema_version(mut self, version: u16) -> Self {
        self.schema_version = Some(version);
        self
    }

    /// Sets the submission ID.
    pub fn submission_id(mut self, id: SubmissionId) -> Self {
        self.submission_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the sequence number.
    pub fn sequence(mut self, sequence: Version) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the actor.
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the event envelope.
    ///
    /// # Panics
    ///
    /// Panics if required fields (event_type, submission_id, aggregate_type,
    /// sequence, actor, payload) are not set.
    pub fn build(self) -> EventEnvelope {
        self.try_build()
            .expect("event_type, submission_id, aggregate_type, sequence, actor and payload are required")
    }

    /// Tries to build the event envelope, returning None if required fields are missing.
    pub fn try_build(self) -> Option<EventEnvelope> {
        Some(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type?,
            schema_version: self.schema_version.unwrap_or(CURRENT_SCHEMA_VERSION),
            submission_id: self.submission_id?,
            aggregate_type: self.aggregate_type?,
            sequence: self.sequence?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            actor: self.actor?,
            payload: self.payload?,
            metadata: self.metadata,
        })
    }
}
