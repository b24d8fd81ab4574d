use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SubmissionId, Version};

/// A persisted copy of a submission's state at a specific stream version.
///
/// The state is an opaque JSON document. Loading code is expected to
/// deserialize it into a plain record and validate it before trusting it;
/// the store never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The submission this snapshot belongs to.
    pub submission_id: SubmissionId,

    /// The type of aggregate (e.g., "Submission").
    pub aggregate_type: String,

    /// Stream version the state corresponds to.
    pub version: Version,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// The serialized state.
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Creates a new snapshot.
    pub fn new(
        submission_id: SubmissionId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            submission_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Creates a snapshot from a serializable state record.
    pub fn from_state<T: Serialize>(
        submission_id: SubmissionId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            submission_id,
            aggregate_type,
            version,
            serde_json::to_value(state)?,
        ))
    }

    /// Deserializes the snapshot state into a concrete record type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
