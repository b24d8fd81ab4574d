//! Submission aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::{Submission, SubmissionSnapshot};
pub use commands::*;
pub use events::{
    AnteproyectoEvaluatedData, AnteproyectoSubmittedData, EvaluatorsAssignedData,
    FormatoAEvaluatedData, FormatoAPresentedData, FormatoAResubmittedData, SubmissionCreatedData,
    SubmissionEvent,
};
pub use service::SubmissionService;
pub use state::{Operation, SubmissionState};
pub use value_objects::{
    AnteproyectoInfo, ArtifactRef, FormatoAInfo, MAX_FORMATO_A_ATTEMPTS, Modality, Participant,
    Participants,
};

use common::UserId;
use thiserror::Error;

/// Errors that can occur during submission operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The operation is not legal from the current state.
    #[error("Illegal transition: cannot {operation} from {current_state} state")]
    IllegalTransition {
        current_state: SubmissionState,
        operation: Operation,
    },

    /// Formato A has no attempts left.
    #[error("Attempt limit exceeded: Formato A was rejected {max} times")]
    AttemptLimitExceeded { max: u8 },

    /// The actor lacks the relationship the operation requires.
    #[error("Unauthorized: user {actor_id} may not {operation}")]
    Unauthorized {
        actor_id: UserId,
        operation: Operation,
    },

    /// A sub-resource that must be unique already exists.
    #[error("Duplicate submission: {0} already exists")]
    DuplicateSubmission(&'static str),

    /// The submission has not been created.
    #[error("Submission not found")]
    NotFound,

    /// Create was called on an existing submission.
    #[error("Submission already created")]
    AlreadyCreated,

    /// A title is required.
    #[error("Title is required")]
    MissingTitle,

    /// Participants do not fit the modality.
    #[error("Invalid participants: {0}")]
    InvalidParticipants(String),

    /// The modality requires an acceptance letter.
    #[error("{modality} requires an acceptance letter")]
    MissingAcceptanceLetter { modality: Modality },

    /// Both evaluator slots hold the same person.
    #[error("Evaluators must be two different people")]
    EvaluatorsMustDiffer,

    /// The evaluator takes part in the submission.
    #[error("User {evaluator_id} cannot evaluate a submission they take part in")]
    InvalidEvaluator { evaluator_id: UserId },

    /// Persisted state violates the aggregate's invariants.
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}
