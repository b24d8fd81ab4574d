//! Submission domain events.
//!
//! This is the schema shared with every consumer. Payloads are stored as
//! `{"type": <kind>, "data": {...}}`; adding an optional field is a
//! compatible change, anything else bumps the envelope schema version.

use common::{SubmissionId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{ArtifactRef, Modality, Participants};

/// Events that can occur on a submission aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SubmissionEvent {
    /// Formato A was registered.
    SubmissionCreated(SubmissionCreatedData),

    /// Formato A was handed to the coordinator.
    FormatoAPresented(FormatoAPresentedData),

    /// The coordinator evaluated Formato A.
    FormatoAEvaluated(FormatoAEvaluatedData),

    /// A corrected Formato A document replaced the previous one.
    FormatoAResubmitted(FormatoAResubmittedData),

    /// The director uploaded the anteproyecto.
    AnteproyectoSubmitted(AnteproyectoSubmittedData),

    /// Two evaluators were assigned to the anteproyecto.
    EvaluatorsAssigned(EvaluatorsAssignedData),

    /// An evaluator issued the final verdict.
    AnteproyectoEvaluated(AnteproyectoEvaluatedData),
}

impl SubmissionEvent {
    /// Every event type this schema defines.
    pub const EVENT_TYPES: [&'static str; 7] = [
        "SubmissionCreated",
        "FormatoAPresented",
        "FormatoAEvaluated",
        "FormatoAResubmitted",
        "AnteproyectoSubmitted",
        "EvaluatorsAssigned",
        "AnteproyectoEvaluated",
    ];

    /// Returns true if `event_type` names a variant of this enum.
    pub fn is_known_type(event_type: &str) -> bool {
        Self::EVENT_TYPES.contains(&event_type)
    }
}

impl DomainEvent for SubmissionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SubmissionEvent::SubmissionCreated(_) => "SubmissionCreated",
            SubmissionEvent::FormatoAPresented(_) => "FormatoAPresented",
            SubmissionEvent::FormatoAEvaluated(_) => "FormatoAEvaluated",
            SubmissionEvent::FormatoAResubmitted(_) => "FormatoAResubmitted",
            SubmissionEvent::AnteproyectoSubmitted(_) => "AnteproyectoSubmitted",
            SubmissionEvent::EvaluatorsAssigned(_) => "EvaluatorsAssigned",
            SubmissionEvent::AnteproyectoEvaluated(_) => "AnteproyectoEvaluated",
        }
    }
}

/// Data for SubmissionCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionCreatedData {
    pub submission_id: SubmissionId,
    pub title: String,
    pub modality: Modality,
    pub participants: Participants,
    pub formato_a: ArtifactRef,
    #[serde(default)]
    pub acceptance_letter: Option<ArtifactRef>,
}

/// Data for FormatoAPresented event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatoAPresentedData {
    /// Attempt being presented.
    pub intento: u8,
}

/// Data for FormatoAEvaluated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatoAEvaluatedData {
    pub approved: bool,

    /// Attempt number after the evaluation.
    pub intento: u8,

    #[serde(default)]
    pub comments: Option<String>,

    /// True when this rejection closes the submission.
    pub definitive: bool,
}

/// Data for FormatoAResubmitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatoAResubmittedData {
    pub intento: u8,
    pub artifact: ArtifactRef,
}

/// Data for AnteproyectoSubmitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnteproyectoSubmittedData {
    pub artifact: ArtifactRef,
    pub title: String,
    pub participants: Participants,
}

/// Data for EvaluatorsAssigned event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorsAssignedData {
    pub evaluator_1: UserId,
    pub evaluator_2: UserId,
}

/// Data for AnteproyectoEvaluated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnteproyectoEvaluatedData {
    pub approved: bool,
    #[serde(default)]
    pub comments: Option<String>,
    pub evaluator: UserId,
}

// Convenience constructors for events
impl SubmissionEvent {
    pub fn submission_created(
        submission_id: SubmissionId,
        title: impl Into<String>,
        modality: Modality,
        participants: Participants,
        formato_a: ArtifactRef,
        acceptance_letter: Option<ArtifactRef>,
    ) -> Self {
        SubmissionEvent::SubmissionCreated(SubmissionCreatedData {
            submission_id,
            title: title.into(),
            modality,
            participants,
            formato_a,
            acceptance_letter,
        })
    }

    pub fn formato_a_presented(intento: u8) -> Self {
        SubmissionEvent::FormatoAPresented(FormatoAPresentedData { intento })
    }

    pub fn formato_a_evaluated(
        approved: bool,
        intento: u8,
        comments: Option<String>,
        definitive: bool,
    ) -> Self {
        SubmissionEvent::FormatoAEvaluated(FormatoAEvaluatedData {
            approved,
            intento,
            comments,
            definitive,
        })
    }

    pub fn formato_a_resubmitted(intento: u8, artifact: ArtifactRef) -> Self {
        SubmissionEvent::FormatoAResubmitted(FormatoAResubmittedData { intento, artifact })
    }

    pub fn anteproyecto_submitted(
        artifact: ArtifactRef,
        title: impl Into<String>,
        participants: Participants,
    ) -> Self {
        SubmissionEvent::AnteproyectoSubmitted(AnteproyectoSubmittedData {
            artifact,
            title: title.into(),
            participants,
        })
    }

    pub fn evaluators_assigned(evaluator_1: UserId, evaluator_2: UserId) -> Self {
        SubmissionEvent::EvaluatorsAssigned(EvaluatorsAssignedData {
            evaluator_1,
            evaluator_2,
        })
    }

    pub fn anteproyecto_evaluated(
        approved: bool,
        comments: Option<String>,
        evaluator: UserId,
    ) -> Self {
        SubmissionEvent::AnteproyectoEvaluated(AnteproyectoEvaluatedData {
            approved,
            comments,
            evaluator,
        })
    }
}
