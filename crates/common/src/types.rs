use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a submission (one event stream per submission).
///
/// Assigned at creation and never changes. Wraps a UUID so it cannot be
/// confused with event IDs or user IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// Creates a new random submission ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a submission ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SubmissionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<SubmissionId> for Uuid {
    fn from(id: SubmissionId) -> Self {
        id.0
    }
}

/// Identifier of a person known to the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Role an actor played when performing an operation.
///
/// Roles are resolved by the identity service; the workflow only records them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    Student,
    Director,
    CoDirector,
    Coordinator,
    Evaluator,
    /// Automated processes (replays, migrations, tests).
    System,
}

impl ActorRole {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Student => "Student",
            ActorRole::Director => "Director",
            ActorRole::CoDirector => "CoDirector",
            ActorRole::Coordinator => "Coordinator",
            ActorRole::Evaluator => "Evaluator",
            ActorRole::System => "System",
        }
    }

    /// Parses a role name produced by [`ActorRole::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Student" => Some(ActorRole::Student),
            "Director" => Some(ActorRole::Director),
            "CoDirector" => Some(ActorRole::CoDirector),
            "Coordinator" => Some(ActorRole::Coordinator),
            "Evaluator" => Some(ActorRole::Evaluator),
            "System" => Some(ActorRole::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who performed an operation: stamped on every event.
///
/// Passed explicitly with each command rather than read from any
/// process-wide "current user".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    /// Creates a new actor.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// The actor used for automated operations.
    pub fn system() -> Self {
        Self {
            id: UserId::new(0),
            name: "system".to_string(),
            role: ActorRole::System,
        }
    }
}
