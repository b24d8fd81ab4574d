//! Submission state machine.

use serde::{Deserialize, Serialize};

/// An operation that can be attempted on an existing submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Present,
    EvaluateFormatoA,
    ResubmitFormatoA,
    SubmitAnteproyecto,
    AssignEvaluators,
    EvaluateAnteproyecto,
}

impl Operation {
    /// Every operation, in workflow order.
    pub const ALL: [Operation; 6] = [
        Operation::Present,
        Operation::EvaluateFormatoA,
        Operation::ResubmitFormatoA,
        Operation::SubmitAnteproyecto,
        Operation::AssignEvaluators,
        Operation::EvaluateAnteproyecto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Present => "present Formato A",
            Operation::EvaluateFormatoA => "evaluate Formato A",
            Operation::ResubmitFormatoA => "resubmit Formato A",
            Operation::SubmitAnteproyecto => "submit anteproyecto",
            Operation::AssignEvaluators => "assign evaluators",
            Operation::EvaluateAnteproyecto => "evaluate anteproyecto",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a submission in its lifecycle.
///
/// State transitions:
/// ```text
/// Drafted ──► PresentedToCoordinator ──┬──► FormatoAApproved ──► AnteproyectoSubmitted
///                  ▲                   │                                 │
///                  │ present()         ├──► FormatoARejectedFinal        ▼
///                  │                   │                          EvaluatorsAssigned
///          CorrectionsRequested ◄──────┘                            │          │
///            (resubmit loops)                                       ▼          ▼
///                                             AnteproyectoApproved   AnteproyectoRejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubmissionState {
    /// Formato A registered, not yet presented.
    #[default]
    Drafted,

    /// Waiting for the coordinator's evaluation.
    PresentedToCoordinator,

    /// Rejected with attempts left; may be resubmitted and presented again.
    CorrectionsRequested,

    /// Formato A accepted; the director may submit the anteproyecto.
    FormatoAApproved,

    /// Rejected on the last attempt (terminal state).
    FormatoARejectedFinal,

    /// Anteproyecto uploaded, waiting for evaluators.
    AnteproyectoSubmitted,

    /// Two evaluators assigned, waiting for their verdict.
    EvaluatorsAssigned,

    /// Anteproyecto accepted (terminal state).
    AnteproyectoApproved,

    /// Anteproyecto rejected (terminal state).
    AnteproyectoRejected,
}

impl SubmissionState {
    /// Every state, in workflow order.
    pub const ALL: [SubmissionState; 9] = [
        SubmissionState::Drafted,
        SubmissionState::PresentedToCoordinator,
        SubmissionState::CorrectionsRequested,
        SubmissionState::FormatoAApproved,
        SubmissionState::FormatoARejectedFinal,
        SubmissionState::AnteproyectoSubmitted,
        SubmissionState::EvaluatorsAssigned,
        SubmissionState::AnteproyectoApproved,
        SubmissionState::AnteproyectoRejected,
    ];

    /// Operations the state machine accepts from this state.
    pub fn allowed_operations(&self) -> &'static [Operation] {
        match self {
            SubmissionState::Drafted => &[Operation::Present],
            SubmissionState::PresentedToCoordinator => &[Operation::EvaluateFormatoA],
            SubmissionState::CorrectionsRequested => {
                &[Operation::Present, Operation::ResubmitFormatoA]
            }
            SubmissionState::FormatoAApproved => &[Operation::SubmitAnteproyecto],
            SubmissionState::AnteproyectoSubmitted => &[Operation::AssignEvaluators],
            SubmissionState::EvaluatorsAssigned => &[Operation::EvaluateAnteproyecto],
            SubmissionState::FormatoARejectedFinal
            | SubmissionState::AnteproyectoApproved
            | SubmissionState::AnteproyectoRejected => &[],
        }
    }

    /// Returns true if `operation` is legal from this state.
    pub fn allows(&self, operation: Operation) -> bool {
        self.allowed_operations().contains(&operation)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::FormatoARejectedFinal
                | SubmissionState::AnteproyectoApproved
                | SubmissionState::AnteproyectoRejected
        )
    }

    /// Returns true once an anteproyecto has been submitted.
    pub fn has_anteproyecto(&self) -> bool {
        matches!(
            self,
            SubmissionState::AnteproyectoSubmitted
                | SubmissionState::EvaluatorsAssigned
                | SubmissionState::AnteproyectoApproved
                | SubmissionState::AnteproyectoRejected
        )
    }

    /// Returns true once evaluators have been assigned.
    pub fn has_evaluators(&self) -> bool {
        matches!(
            self,
            SubmissionState::EvaluatorsAssigned
                | SubmissionState::AnteproyectoApproved
                | SubmissionState::AnteproyectoRejected
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Drafted => "Drafted",
            SubmissionState::PresentedToCoordinator => "PresentedToCoordinator",
            SubmissionState::CorrectionsRequested => "CorrectionsRequested",
            SubmissionState::FormatoAApproved => "FormatoAApproved",
            SubmissionState::FormatoARejectedFinal => "FormatoARejectedFinal",
            SubmissionState::AnteproyectoSubmitted => "AnteproyectoSubmitted",
            SubmissionState::EvaluatorsAssigned => "EvaluatorsAssigned",
            SubmissionState::AnteproyectoApproved => "AnteproyectoApproved",
            SubmissionState::AnteproyectoRejected => "AnteproyectoRejected",
        }
    }

    /// Parses a name produced by [`SubmissionState::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == value)
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
