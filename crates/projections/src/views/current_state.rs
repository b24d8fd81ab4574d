//! Current-state view: one denormalized row per submission.

use chrono::{DateTime, Utc};
use common::{SubmissionId, UserId};
use domain::{ArtifactRef, Modality, Participants};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::adapter::ProjectedChange;

/// A value paired with the sequence of the event that last wrote it.
///
/// Groups advance independently of the row's state, so an event that arrives
/// after a newer one can still fill in the fields nobody newer has touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouped<T> {
    pub value: Option<T>,
    pub source: Version,
}

impl<T> Default for Grouped<T> {
    fn default() -> Self {
        Self {
            value: None,
            source: Version::initial(),
        }
    }
}

impl<T> Grouped<T> {
    /// Takes `value` if `sequence` is newer than the current source.
    pub fn offer(&mut self, value: Option<T>, sequence: Version) -> bool {
        if sequence <= self.source {
            return false;
        }
        self.value = value;
        self.source = sequence;
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// Title and participants, written at creation and again with the anteproyecto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub title: String,
    pub participants: Participants,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub modality: Modality,
    pub acceptance_letter: Option<ArtifactRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub approved: bool,
    pub comments: Option<String>,
    pub evaluator: UserId,
}

/// Result of folding one change into a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorbed {
    /// The change was newer than the row and moved its state.
    Advanced,
    /// The change was older than the row; only untouched field groups took it.
    Stale,
}

/// The current-state row for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStateRow {
    pub submission_id: SubmissionId,

    /// State code as written by the aggregate; empty until a known event lands.
    pub state: String,

    /// Sequence of the newest event that moved `state`.
    pub last_applied_sequence: Version,

    /// Bumped by the store on every commit.
    pub revision: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub intento: Grouped<u8>,
    pub details: Grouped<Details>,
    pub registration: Grouped<Registration>,
    pub formato_a: Grouped<ArtifactRef>,
    pub formato_a_comments: Grouped<String>,
    pub anteproyecto: Grouped<ArtifactRef>,
    pub evaluators: Grouped<(UserId, UserId)>,
    pub outcome: Grouped<Outcome>,
}

impl CurrentStateRow {
    /// An empty row, created the first time any event for the submission is seen.
    pub fn shell(submission_id: SubmissionId, first_seen: DateTime<Utc>) -> Self {
        Self {
            submission_id,
            state: String::new(),
            last_applied_sequence: Version::initial(),
            revision: 0,
            created_at: first_seen,
            updated_at: first_seen,
            intento: Grouped::default(),
            details: Grouped::default(),
            registration: Grouped::default(),
            formato_a: Grouped::default(),
            formato_a_comments: Grouped::default(),
            anteproyecto: Grouped::default(),
            evaluators: Grouped::default(),
            outcome: Grouped::default(),
        }
    }

    /// Returns true until a recognized event has set the state.
    pub fn is_shell(&self) -> bool {
        self.state.is_empty()
    }

    pub fn participants(&self) -> Option<&Participants> {
        self.details.get().map(|details| &details.participants)
    }

    /// Folds `change`, written at `sequence` and `timestamp`, into the row.
    pub fn absorb(
        &mut self,
        change: ProjectedChange,
        sequence: Version,
        timestamp: DateTime<Utc>,
    ) -> Absorbed {
        self.created_at = self.created_at.min(timestamp);

        let absorbed = if sequence > self.last_applied_sequence {
            self.state = change.resulting_state().as_str().to_string();
            self.last_applied_sequence = sequence;
            self.updated_at = timestamp;
            Absorbed::Advanced
        } else {
            Absorbed::Stale
        };

        if let Some(intento) = change.intento() {
            self.intento.offer(Some(intento), sequence);
        }

        match change {
            ProjectedChange::Created {
                title,
                modality,
                participants,
                formato_a,
                acceptance_letter,
            } => {
                self.details.offer(
                    Some(Details {
                        title,
                        participants,
                    }),
                    sequence,
                );
                self.registration.offer(
                    Some(Registration {
                        modality,
                        acceptance_letter,
                    }),
                    sequence,
                );
                self.formato_a.offer(Some(formato_a), sequence);
            }
            ProjectedChange::FormatoAPresented { .. } => {}
            ProjectedChange::FormatoAEvaluated { comments, .. } => {
                self.formato_a_comments.offer(comments, sequence);
            }
            ProjectedChange::FormatoAResubmitted { artifact, .. } => {
                self.formato_a.offer(Some(artifact), sequence);
            }
            ProjectedChange::AnteproyectoSubmitted {
                artifact,
                title,
                participants,
            } => {
                self.anteproyecto.offer(Some(artifact), sequence);
                self.details.offer(
                    Some(Details {
                        title,
                        participants,
                    }),
                    sequence,
                );
            }
            ProjectedChange::EvaluatorsAssigned {
                evaluator_1,
                evaluator_2,
            } => {
                self.evaluators
                    .offer(Some((evaluator_1, evaluator_2)), sequence);
            }
            ProjectedChange::AnteproyectoEvaluated {
                approved,
                comments,
                evaluator,
            } => {
                self.outcome.offer(
                    Some(Outcome {
                        approved,
                        comments,
                        evaluator,
                    }),
                    sequence,
                );
            }
        }

        absorbed
    }

    /// Compares everything a reader can observe, ignoring the commit counter.
    pub fn same_view(&self, other: &Self) -> bool {
        let mut left = self.clone();
        left.revision = other.revision;
        left == *other
    }
}
