//! Collaborator ports consumed by the workflow.
//!
//! Each port is an async trait plus an in-memory implementation for tests
//! and local runs. Real adapters (object storage, mail, directory service)
//! live outside this workspace.

mod identity;
mod notification;
mod storage;

pub use identity::{IdentityPort, InMemoryIdentityDirectory, UserProfile};
pub use notification::{InMemoryNotifier, Notification, NotificationPort};
pub use storage::{FileStoragePort, InMemoryFileStorage};

use thiserror::Error;

use crate::submission::ArtifactRef;

/// Errors raised by collaborator ports.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(ArtifactRef),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Identity lookup failed: {0}")]
    Identity(String),
}
