//! Translation of envelopes into read-side changes.
//!
//! The write side owns the event schema; this module is the only place the
//! read side looks at payloads. Envelopes written with a newer schema or an
//! unknown event type translate to `None` so the projector can keep the fact
//! without guessing at its meaning.

use common::UserId;
use domain::{ArtifactRef, Modality, Participants, SubmissionEvent, SubmissionState};
use event_store::{CURRENT_SCHEMA_VERSION, EventEnvelope};

use crate::Result;

/// What an event means for the current-state view.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedChange {
    Created {
        title: String,
        modality: Modality,
        participants: Participants,
        formato_a: ArtifactRef,
        acceptance_letter: Option<ArtifactRef>,
    },
    FormatoAPresented {
        intento: u8,
    },
    FormatoAEvaluated {
        approved: bool,
        intento: u8,
        comments: Option<String>,
        definitive: bool,
    },
    FormatoAResubmitted {
        intento: u8,
        artifact: ArtifactRef,
    },
    AnteproyectoSubmitted {
        artifact: ArtifactRef,
        title: String,
        participants: Participants,
    },
    EvaluatorsAssigned {
        evaluator_1: UserId,
        evaluator_2: UserId,
    },
    AnteproyectoEvaluated {
        approved: bool,
        comments: Option<String>,
        evaluator: UserId,
    },
}

impl ProjectedChange {
    /// State the submission is in right after this event.
    pub fn resulting_state(&self) -> SubmissionState {
        match self {
            ProjectedChange::Created { .. } => SubmissionState::Drafted,
            ProjectedChange::FormatoAPresented { .. } => SubmissionState::PresentedToCoordinator,
            ProjectedChange::FormatoAEvaluated { approved: true, .. } => {
                SubmissionState::FormatoAApproved
            }
            ProjectedChange::FormatoAEvaluated {
                definitive: true, ..
            } => SubmissionState::FormatoARejectedFinal,
            ProjectedChange::FormatoAEvaluated { .. }
            | ProjectedChange::FormatoAResubmitted { .. } => SubmissionState::CorrectionsRequested,
            ProjectedChange::AnteproyectoSubmitted { .. } => SubmissionState::AnteproyectoSubmitted,
            ProjectedChange::EvaluatorsAssigned { .. } => SubmissionState::EvaluatorsAssigned,
            ProjectedChange::AnteproyectoEvaluated { approved: true, .. } => {
                SubmissionState::AnteproyectoApproved
            }
            ProjectedChange::AnteproyectoEvaluated { .. } => SubmissionState::AnteproyectoRejected,
        }
    }

    /// Formato A attempt carried by the event, if any.
    pub fn intento(&self) -> Option<u8> {
        match self {
            ProjectedChange::Created { .. } => Some(1),
            ProjectedChange::FormatoAPresented { intento }
            | ProjectedChange::FormatoAEvaluated { intento, .. }
            | ProjectedChange::FormatoAResubmitted { intento, .. } => Some(*intento),
            _ => None,
        }
    }
}

impl From<SubmissionEvent> for ProjectedChange {
    fn from(event: SubmissionEvent) -> Self {
        match event {
            SubmissionEvent::SubmissionCreated(data) => ProjectedChange::Created {
                title: data.title,
                modality: data.modality,
                participants: data.participants,
                formato_a: data.formato_a,
                acceptance_letter: data.acceptance_letter,
            },
            SubmissionEvent::FormatoAPresented(data) => ProjectedChange::FormatoAPresented {
                intento: data.intento,
            },
            SubmissionEvent::FormatoAEvaluated(data) => ProjectedChange::FormatoAEvaluated {
                approved: data.approved,
                intento: data.intento,
                comments: data.comments,
                definitive: data.definitive,
            },
            SubmissionEvent::FormatoAResubmitted(data) => ProjectedChange::FormatoAResubmitted {
                intento: data.intento,
                artifact: data.artifact,
            },
            SubmissionEvent::AnteproyectoSubmitted(data) => {
                ProjectedChange::AnteproyectoSubmitted {
                    artifact: data.artifact,
                    title: data.title,
                    participants: data.participants,
                }
            }
            SubmissionEvent::EvaluatorsAssigned(data) => ProjectedChange::EvaluatorsAssigned {
                evaluator_1: data.evaluator_1,
                evaluator_2: data.evaluator_2,
            },
            SubmissionEvent::AnteproyectoEvaluated(data) => {
                ProjectedChange::AnteproyectoEvaluated {
                    approved: data.approved,
                    comments: data.comments,
                    evaluator: data.evaluator,
                }
            }
        }
    }
}

/// Translates an envelope.
///
/// Returns `Ok(None)` for envelopes this reader does not understand and an
/// error only when a known event type carries a payload that does not decode.
pub fn adapt(envelope: &EventEnvelope) -> Result<Option<ProjectedChange>> {
    if envelope.schema_version > CURRENT_SCHEMA_VERSION
        || !SubmissionEvent::is_known_type(&envelope.event_type)
    {
        return Ok(None);
    }

    let event: SubmissionEvent = serde_json::from_value(envelope.payload.clone())?;
    Ok(Some(event.into()))
}
