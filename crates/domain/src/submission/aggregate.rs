//! Submission aggregate implementation.

use common::{SubmissionId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    AnteproyectoInfo, ArtifactRef, FormatoAInfo, MAX_FORMATO_A_ATTEMPTS, Modality, Operation,
    Participants, SubmissionError, SubmissionEvent, SubmissionState,
    events::{FormatoAEvaluatedData, SubmissionCreatedData},
};

/// Submission aggregate root.
///
/// Owns one thesis proposal from Formato A registration to the final
/// anteproyecto verdict. Command methods are pure: they validate against the
/// current state and return the events to record.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    id: Option<SubmissionId>,
    version: Version,
    title: String,
    modality: Option<Modality>,
    participants: Option<Participants>,
    state: SubmissionState,
    formato_a: Option<FormatoAInfo>,
    anteproyecto: Option<AnteproyectoInfo>,
}

/// Persisted state of a submission, restored through [`Submission::rehydrate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSnapshot {
    pub submission_id: SubmissionId,
    pub title: String,
    pub modality: Modality,
    pub participants: Participants,
    pub state: SubmissionState,
    pub formato_a: FormatoAInfo,
    pub anteproyecto: Option<AnteproyectoInfo>,
}

impl Aggregate for Submission {
    type Event = SubmissionEvent;
    type Error = SubmissionError;

    fn aggregate_type() -> &'static str {
        "Submission"
    }

    fn id(&self) -> Option<SubmissionId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SubmissionEvent::SubmissionCreated(data) => self.apply_created(data),
            SubmissionEvent::FormatoAPresented(_) => {
                self.state = SubmissionState::PresentedToCoordinator;
            }
            SubmissionEvent::FormatoAEvaluated(data) => self.apply_formato_a_evaluated(data),
            SubmissionEvent::FormatoAResubmitted(data) => {
                if let Some(info) = self.formato_a.as_mut() {
                    info.artifact = data.artifact;
                }
            }
            SubmissionEvent::AnteproyectoSubmitted(data) => {
                self.anteproyecto = Some(AnteproyectoInfo::submitted(data.artifact));
                self.state = SubmissionState::AnteproyectoSubmitted;
            }
            SubmissionEvent::EvaluatorsAssigned(data) => {
                if let Some(info) = self.anteproyecto.as_mut() {
                    info.evaluators = Some((data.evaluator_1, data.evaluator_2));
                }
                self.state = SubmissionState::EvaluatorsAssigned;
            }
            SubmissionEvent::AnteproyectoEvaluated(data) => {
                if let Some(info) = self.anteproyecto.as_mut() {
                    info.approved = Some(data.approved);
                    info.comments = data.comments;
                }
                self.state = if data.approved {
                    SubmissionState::AnteproyectoApproved
                } else {
                    SubmissionState::AnteproyectoRejected
                };
            }
        }
    }
}

impl SnapshotCapable for Submission {
    type Snapshot = SubmissionSnapshot;

    fn snapshot_interval() -> usize {
        5
    }

    fn to_snapshot(&self) -> Option<SubmissionSnapshot> {
        Some(SubmissionSnapshot {
            submission_id: self.id?,
            title: self.title.clone(),
            modality: self.modality?,
            participants: self.participants.clone()?,
            state: self.state,
            formato_a: self.formato_a.clone()?,
            anteproyecto: self.anteproyecto.clone(),
        })
    }

    fn rehydrate(snapshot: SubmissionSnapshot, version: Version) -> Result<Self, SubmissionError> {
        Self::rehydrate(snapshot, version)
    }
}

// Query methods
impl Submission {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn modality(&self) -> Option<Modality> {
        self.modality
    }

    pub fn participants(&self) -> Option<&Participants> {
        self.participants.as_ref()
    }

    /// Returns the current state.
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn formato_a(&self) -> Option<&FormatoAInfo> {
        self.formato_a.as_ref()
    }

    pub fn anteproyecto(&self) -> Option<&AnteproyectoInfo> {
        self.anteproyecto.as_ref()
    }

    /// Current Formato A attempt; 0 before the submission exists.
    pub fn intento(&self) -> u8 {
        self.formato_a.as_ref().map_or(0, |info| info.intento)
    }

    /// Returns true if the submission is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Submission {
    /// Registers a new submission with its first Formato A document.
    pub fn create(
        &self,
        submission_id: SubmissionId,
        title: impl Into<String>,
        modality: Modality,
        participants: Participants,
        formato_a: ArtifactRef,
        acceptance_letter: Option<ArtifactRef>,
    ) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        if self.id.is_some() {
            return Err(SubmissionError::AlreadyCreated);
        }

        let title = title.into();
        if title.trim().is_empty() {
            return Err(SubmissionError::MissingTitle);
        }

        participants.validate(modality)?;

        if modality.requires_acceptance_letter() && acceptance_letter.is_none() {
            return Err(SubmissionError::MissingAcceptanceLetter { modality });
        }

        Ok(vec![SubmissionEvent::submission_created(
            submission_id,
            title,
            modality,
            participants,
            formato_a,
            acceptance_letter,
        )])
    }

    /// Hands Formato A to the coordinator.
    pub fn present(&self) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        self.ensure_created()?;
        self.ensure_allowed(Operation::Present)?;

        Ok(vec![SubmissionEvent::formato_a_presented(
            self.current_formato_a()?.intento,
        )])
    }

    /// Records the coordinator's verdict on Formato A.
    ///
    /// A rejection with attempts left moves the submission to
    /// `CorrectionsRequested` with the next attempt number; a rejection of the
    /// last attempt is definitive.
    pub fn evaluate_formato_a(
        &self,
        approved: bool,
        comments: Option<String>,
    ) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        self.ensure_created()?;
        self.ensure_allowed(Operation::EvaluateFormatoA)?;

        let info = self.current_formato_a()?;
        let event = if approved {
            SubmissionEvent::formato_a_evaluated(true, info.intento, comments, false)
        } else if info.has_attempts_left() {
            SubmissionEvent::formato_a_evaluated(false, info.intento + 1, comments, false)
        } else {
            SubmissionEvent::formato_a_evaluated(false, info.intento, comments, true)
        };

        Ok(vec![event])
    }

    /// Replaces the Formato A document after a rejection.
    ///
    /// The submission stays in `CorrectionsRequested` until presented again.
    pub fn resubmit_formato_a(
        &self,
        artifact: ArtifactRef,
    ) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        self.ensure_created()?;

        if self.state == SubmissionState::FormatoARejectedFinal {
            return Err(SubmissionError::AttemptLimitExceeded {
                max: MAX_FORMATO_A_ATTEMPTS,
            });
        }
        self.ensure_allowed(Operation::ResubmitFormatoA)?;

        Ok(vec![SubmissionEvent::formato_a_resubmitted(
            self.current_formato_a()?.intento,
            artifact,
        )])
    }

    /// Uploads the anteproyecto. Only the director may do this, once.
    pub fn submit_anteproyecto(
        &self,
        actor_id: UserId,
        artifact: ArtifactRef,
    ) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        self.ensure_created()?;

        if self.anteproyecto.is_some() {
            return Err(SubmissionError::DuplicateSubmission("anteproyecto"));
        }
        self.ensure_allowed(Operation::SubmitAnteproyecto)?;

        let participants = self.current_participants()?;
        if !participants.is_director(actor_id) {
            return Err(SubmissionError::Unauthorized {
                actor_id,
                operation: Operation::SubmitAnteproyecto,
            });
        }

        Ok(vec![SubmissionEvent::anteproyecto_submitted(
            artifact,
            self.title.clone(),
            participants.clone(),
        )])
    }

    /// Assigns the two anteproyecto evaluators. Assignments are never replaced.
    pub fn assign_evaluators(
        &self,
        evaluator_1: UserId,
        evaluator_2: UserId,
    ) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        self.ensure_created()?;

        if self
            .anteproyecto
            .as_ref()
            .is_some_and(|info| info.evaluators.is_some())
        {
            return Err(SubmissionError::DuplicateSubmission("evaluator assignment"));
        }
        self.ensure_allowed(Operation::AssignEvaluators)?;

        if evaluator_1 == evaluator_2 {
            return Err(SubmissionError::EvaluatorsMustDiffer);
        }

        let participants = self.current_participants()?.all_ids();
        for evaluator_id in [evaluator_1, evaluator_2] {
            if participants.contains(&evaluator_id) {
                return Err(SubmissionError::InvalidEvaluator { evaluator_id });
            }
        }

        Ok(vec![SubmissionEvent::evaluators_assigned(
            evaluator_1,
            evaluator_2,
        )])
    }

    /// Records the final anteproyecto verdict from one of the assigned evaluators.
    pub fn evaluate_anteproyecto(
        &self,
        approved: bool,
        comments: Option<String>,
        actor_id: UserId,
    ) -> Result<Vec<SubmissionEvent>, SubmissionError> {
        self.ensure_created()?;
        self.ensure_allowed(Operation::EvaluateAnteproyecto)?;

        let is_evaluator = self
            .anteproyecto
            .as_ref()
            .is_some_and(|info| info.is_evaluator(actor_id));
        if !is_evaluator {
            return Err(SubmissionError::Unauthorized {
                actor_id,
                operation: Operation::EvaluateAnteproyecto,
            });
        }

        Ok(vec![SubmissionEvent::anteproyecto_evaluated(
            approved, comments, actor_id,
        )])
    }
}

// Rehydration
impl Submission {
    /// Restores a submission from persisted state without replaying events.
    ///
    /// This is the only way to build a submission other than applying events.
    /// The record is checked against every invariant the state machine
    /// maintains; anything inconsistent is rejected as `CorruptSnapshot`.
    pub fn rehydrate(
        snapshot: SubmissionSnapshot,
        version: Version,
    ) -> Result<Self, SubmissionError> {
        validate_snapshot(&snapshot, version).map_err(SubmissionError::CorruptSnapshot)?;

        Ok(Self {
            id: Some(snapshot.submission_id),
            version,
            title: snapshot.title,
            modality: Some(snapshot.modality),
            participants: Some(snapshot.participants),
            state: snapshot.state,
            formato_a: Some(snapshot.formato_a),
            anteproyecto: snapshot.anteproyecto,
        })
    }
}

fn validate_snapshot(snapshot: &SubmissionSnapshot, version: Version) -> Result<(), String> {
    if version < Version::first() {
        return Err(format!("version {version} is below the first event"));
    }
    if snapshot.title.trim().is_empty() {
        return Err("title is empty".to_string());
    }

    snapshot
        .participants
        .validate(snapshot.modality)
        .map_err(|e| e.to_string())?;

    let formato_a = &snapshot.formato_a;
    if !(1..=MAX_FORMATO_A_ATTEMPTS).contains(&formato_a.intento) {
        return Err(format!(
            "intento {} outside 1..={MAX_FORMATO_A_ATTEMPTS}",
            formato_a.intento
        ));
    }
    if snapshot.modality.requires_acceptance_letter() && formato_a.acceptance_letter.is_none() {
        return Err(format!("{} without acceptance letter", snapshot.modality));
    }

    match snapshot.state {
        SubmissionState::FormatoARejectedFinal if formato_a.intento != MAX_FORMATO_A_ATTEMPTS => {
            return Err(format!(
                "final rejection at intento {}",
                formato_a.intento
            ));
        }
        SubmissionState::CorrectionsRequested if formato_a.intento < 2 => {
            return Err("corrections requested before any rejection".to_string());
        }
        _ => {}
    }

    match (&snapshot.anteproyecto, snapshot.state.has_anteproyecto()) {
        (None, false) => Ok(()),
        (None, true) => Err(format!("{} without anteproyecto", snapshot.state)),
        (Some(_), false) => Err(format!("anteproyecto present in {}", snapshot.state)),
        (Some(info), true) => validate_anteproyecto(info, snapshot.state),
    }
}

fn validate_anteproyecto(info: &AnteproyectoInfo, state: SubmissionState) -> Result<(), String> {
    match (info.evaluators, state.has_evaluators()) {
        (Some((a, b)), true) if a == b => return Err("evaluators are the same person".into()),
        (Some(_), true) | (None, false) => {}
        (None, true) => return Err(format!("{state} without evaluators")),
        (Some(_), false) => return Err(format!("evaluators present in {state}")),
    }

    let expected_outcome = match state {
        SubmissionState::AnteproyectoApproved => Some(true),
        SubmissionState::AnteproyectoRejected => Some(false),
        _ => None,
    };
    if info.approved != expected_outcome {
        return Err(format!("anteproyecto outcome does not match {state}"));
    }
    Ok(())
}

// Apply event helpers
impl Submission {
    fn apply_created(&mut self, data: SubmissionCreatedData) {
        self.id = Some(data.submission_id);
        self.title = data.title;
        self.modality = Some(data.modality);
        self.participants = Some(data.participants);
        self.formato_a = Some(FormatoAInfo::first_attempt(
            data.formato_a,
            data.acceptance_letter,
        ));
        self.anteproyecto = None;
        self.state = SubmissionState::Drafted;
    }

    fn apply_formato_a_evaluated(&mut self, data: FormatoAEvaluatedData) {
        if let Some(info) = self.formato_a.as_mut() {
            info.intento = data.intento;
            info.last_comments = data.comments;
        }
        self.state = if data.approved {
            SubmissionState::FormatoAApproved
        } else if data.definitive {
            SubmissionState::FormatoARejectedFinal
        } else {
            SubmissionState::CorrectionsRequested
        };
    }

    fn ensure_created(&self) -> Result<(), SubmissionError> {
        if self.id.is_none() {
            return Err(SubmissionError::NotFound);
        }
        Ok(())
    }

    fn ensure_allowed(&self, operation: Operation) -> Result<(), SubmissionError> {
        if !self.state.allows(operation) {
            return Err(SubmissionError::IllegalTransition {
                current_state: self.state,
                operation,
            });
        }
        Ok(())
    }

    fn current_formato_a(&self) -> Result<&FormatoAInfo, SubmissionError> {
        self.formato_a.as_ref().ok_or(SubmissionError::NotFound)
    }

    fn current_participants(&self) -> Result<&Participants, SubmissionError> {
        self.participants.as_ref().ok_or(SubmissionError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::Participant;

    const DIRECTOR: i64 = 1;
    const STUDENT: i64 = 10;

    fn participants() -> Participants {
        Participants::new(
            Participant::new(DIRECTOR, "Carlos Pérez"),
            Participant::new(STUDENT, "Ana Torres"),
        )
    }

    fn created() -> Submission {
        let mut submission = Submission::default();
        let events = submission
            .create(
                SubmissionId::new(),
                "Detección de plagas con visión artificial",
                Modality::Investigacion,
                participants(),
                ArtifactRef::new("mem://1/formato_a.pdf"),
                None,
            )
            .unwrap();
        submission.apply_events(events);
        submission
    }

    fn run(
        submission: &mut Submission,
        decide: impl FnOnce(&Submission) -> Result<Vec<SubmissionEvent>, SubmissionError>,
    ) {
        let events = decide(submission).unwrap();
        submission.apply_events(events);
    }

    fn reject(submission: &mut Submission) {
        run(submission, |s| s.present());
        run(submission, |s| {
            s.evaluate_formato_a(false, Some("ajustar objetivos".into()))
        });
    }

    fn approved() -> Submission {
        let mut submission = created();
        run(&mut submission, |s| s.present());
        run(&mut submission, |s| s.evaluate_formato_a(true, None));
        submission
    }

    #[test]
    fn create_starts_in_drafted_at_first_attempt() {
        let submission = created();
        assert!(submission.id().is_some());
        assert_eq!(submission.state(), SubmissionState::Drafted);
        assert_eq!(submission.intento(), 1);
        assert_eq!(submission.modality(), Some(Modality::Investigacion));
    }

    #[test]
    fn create_twice_fails() {
        let submission = created();
        let result = submission.create(
            SubmissionId::new(),
            "Otro",
            Modality::Investigacion,
            participants(),
            ArtifactRef::new("x"),
            None,
        );
        assert_eq!(result, Err(SubmissionError::AlreadyCreated));
    }

    #[test]
    fn internship_requires_acceptance_letter() {
        let result = Submission::default().create(
            SubmissionId::new(),
            "Práctica en empresa",
            Modality::PracticaProfesional,
            participants(),
            ArtifactRef::new("x"),
            None,
        );
        assert_eq!(
            result,
            Err(SubmissionError::MissingAcceptanceLetter {
                modality: Modality::PracticaProfesional
            })
        );
    }

    #[test]
    fn operations_on_missing_submission_are_not_found() {
        let submission = Submission::default();
        assert_eq!(submission.present(), Err(SubmissionError::NotFound));
        assert_eq!(
            submission.resubmit_formato_a(ArtifactRef::new("x")),
            Err(SubmissionError::NotFound)
        );
    }

    #[test]
    fn rejection_with_attempts_left_requests_corrections() {
        let mut submission = created();
        reject(&mut submission);

        assert_eq!(submission.state(), SubmissionState::CorrectionsRequested);
        assert_eq!(submission.intento(), 2);
        assert_eq!(
            submission.formato_a().unwrap().last_comments.as_deref(),
            Some("ajustar objetivos")
        );
    }

    #[test]
    fn third_rejection_is_definitive() {
        let mut submission = created();
        reject(&mut submission);
        reject(&mut submission);
        assert_eq!(submission.state(), SubmissionState::CorrectionsRequested);
        assert_eq!(submission.intento(), 3);

        run(&mut submission, |s| s.present());
        let events = submission.evaluate_formato_a(false, None).unwrap();
        assert_eq!(
            events,
            vec![SubmissionEvent::formato_a_evaluated(false, 3, None, true)]
        );
        submission.apply_events(events);

        assert_eq!(submission.state(), SubmissionState::FormatoARejectedFinal);
        assert_eq!(submission.intento(), 3);
        assert!(submission.is_terminal());
    }

    #[test]
    fn resubmit_keeps_state_and_replaces_artifact() {
        let mut submission = created();
        reject(&mut submission);

        let artifact = ArtifactRef::new("mem://2/formato_a_v2.pdf");
        run(&mut submission, |s| s.resubmit_formato_a(artifact.clone()));

        assert_eq!(submission.state(), SubmissionState::CorrectionsRequested);
        assert_eq!(submission.formato_a().unwrap().artifact, artifact);
    }

    #[test]
    fn resubmit_from_drafted_is_illegal() {
        let submission = created();
        assert_eq!(
            submission.resubmit_formato_a(ArtifactRef::new("x")),
            Err(SubmissionError::IllegalTransition {
                current_state: SubmissionState::Drafted,
                operation: Operation::ResubmitFormatoA,
            })
        );
    }

    #[test]
    fn only_the_director_submits_the_anteproyecto() {
        let submission = approved();
        let result = submission.submit_anteproyecto(UserId::new(STUDENT), ArtifactRef::new("a"));
        assert_eq!(
            result,
            Err(SubmissionError::Unauthorized {
                actor_id: UserId::new(STUDENT),
                operation: Operation::SubmitAnteproyecto,
            })
        );
        assert!(
            submission
                .submit_anteproyecto(UserId::new(DIRECTOR), ArtifactRef::new("a"))
                .is_ok()
        );
    }

    #[test]
    fn second_anteproyecto_is_a_duplicate() {
        let mut submission = approved();
        run(&mut submission, |s| {
            s.submit_anteproyecto(UserId::new(DIRECTOR), ArtifactRef::new("a"))
        });
        assert_eq!(
            submission.submit_anteproyecto(UserId::new(DIRECTOR), ArtifactRef::new("b")),
            Err(SubmissionError::DuplicateSubmission("anteproyecto"))
        );
    }

    #[test]
    fn evaluator_rules() {
        let mut submission = approved();
        run(&mut submission, |s| {
            s.submit_anteproyecto(UserId::new(DIRECTOR), ArtifactRef::new("a"))
        });

        assert_eq!(
            submission.assign_evaluators(UserId::new(7), UserId::new(7)),
            Err(SubmissionError::EvaluatorsMustDiffer)
        );
        assert_eq!(
            submission.assign_evaluators(UserId::new(7), UserId::new(DIRECTOR)),
            Err(SubmissionError::InvalidEvaluator {
                evaluator_id: UserId::new(DIRECTOR)
            })
        );

        run(&mut submission, |s| {
            s.assign_evaluators(UserId::new(7), UserId::new(9))
        });
        assert_eq!(
            submission.assign_evaluators(UserId::new(7), UserId::new(11)),
            Err(SubmissionError::DuplicateSubmission("evaluator assignment"))
        );
    }

    #[test]
    fn only_assigned_evaluators_decide() {
        let mut submission = approved();
        run(&mut submission, |s| {
            s.submit_anteproyecto(UserId::new(DIRECTOR), ArtifactRef::new("a"))
        });
        run(&mut submission, |s| {
            s.assign_evaluators(UserId::new(7), UserId::new(9))
        });

        assert!(matches!(
            submission.evaluate_anteproyecto(true, None, UserId::new(8)),
            Err(SubmissionError::Unauthorized { .. })
        ));

        run(&mut submission, |s| {
            s.evaluate_anteproyecto(false, Some("alcance insuficiente".into()), UserId::new(9))
        });
        assert_eq!(submission.state(), SubmissionState::AnteproyectoRejected);
        assert_eq!(submission.anteproyecto().unwrap().approved, Some(false));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut submission = created();
        reject(&mut submission);
        submission.set_version(Version::new(3));

        let snapshot = submission.to_snapshot().unwrap();
        let restored = Submission::rehydrate(snapshot.clone(), Version::new(3)).unwrap();

        assert_eq!(restored.to_snapshot().unwrap(), snapshot);
        assert_eq!(restored.version(), Version::new(3));
        assert_eq!(restored.intento(), 2);
    }

    #[test]
    fn rehydrate_rejects_broken_invariants() {
        let mut submission = created();
        reject(&mut submission);
        let good = submission.to_snapshot().unwrap();

        let mut too_many = good.clone();
        too_many.formato_a.intento = 4;
        assert!(matches!(
            Submission::rehydrate(too_many, Version::new(3)),
            Err(SubmissionError::CorruptSnapshot(_))
        ));

        let mut early_final = good.clone();
        early_final.state = SubmissionState::FormatoARejectedFinal;
        assert!(Submission::rehydrate(early_final, Version::new(3)).is_err());

        let mut premature = good.clone();
        premature.anteproyecto = Some(AnteproyectoInfo::submitted(ArtifactRef::new("a")));
        assert!(Submission::rehydrate(premature, Version::new(3)).is_err());

        let mut missing = good.clone();
        missing.state = SubmissionState::EvaluatorsAssigned;
        assert!(Submission::rehydrate(missing, Version::new(3)).is_err());

        assert!(Submission::rehydrate(good, Version::initial()).is_err());
    }
}
