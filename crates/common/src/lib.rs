//! Shared types for the submission workflow services.

mod types;

pub use types::{Actor, ActorRole, SubmissionId, UserId};
