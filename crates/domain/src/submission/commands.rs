//! Submission commands.
//!
//! Every command names its target submission and the acting user, and may
//! carry the stream version the caller last saw. A command with an expected
//! version fails with a concurrency conflict if the stream has moved since.

use common::{Actor, SubmissionId, UserId};
use event_store::Version;

use crate::command::Command;

use super::{ArtifactRef, Modality, Participants, Submission};

macro_rules! submission_command {
    ($name:ident) => {
        impl $name {
            /// Requires the stream to still be at `version` when the command runs.
            pub fn expecting(mut self, version: Version) -> Self {
                self.expected_version = Some(version);
                self
            }
        }

        impl Command for $name {
            type Aggregate = Submission;

            fn submission_id(&self) -> SubmissionId {
                self.submission_id
            }

            fn actor(&self) -> &Actor {
                &self.actor
            }

            fn expected_version(&self) -> Option<Version> {
                self.expected_version
            }
        }
    };
}

/// Command to register a new submission with its first Formato A.
#[derive(Debug, Clone)]
pub struct CreateSubmission {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
    pub title: String,
    pub modality: Modality,
    pub participants: Participants,
    pub formato_a: ArtifactRef,
    pub acceptance_letter: Option<ArtifactRef>,
}

impl CreateSubmission {
    /// Creates the command with a freshly generated submission id.
    pub fn new(
        actor: Actor,
        title: impl Into<String>,
        modality: Modality,
        participants: Participants,
        formato_a: ArtifactRef,
    ) -> Self {
        Self {
            submission_id: SubmissionId::new(),
            actor,
            expected_version: None,
            title: title.into(),
            modality,
            participants,
            formato_a,
            acceptance_letter: None,
        }
    }

    pub fn with_id(mut self, submission_id: SubmissionId) -> Self {
        self.submission_id = submission_id;
        self
    }

    pub fn with_acceptance_letter(mut self, letter: ArtifactRef) -> Self {
        self.acceptance_letter = Some(letter);
        self
    }
}

submission_command!(CreateSubmission);

/// Command to hand Formato A to the coordinator.
#[derive(Debug, Clone)]
pub struct PresentFormatoA {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
}

impl PresentFormatoA {
    pub fn new(submission_id: SubmissionId, actor: Actor) -> Self {
        Self {
            submission_id,
            actor,
            expected_version: None,
        }
    }
}

submission_command!(PresentFormatoA);

/// Command to record the coordinator's Formato A verdict.
#[derive(Debug, Clone)]
pub struct EvaluateFormatoA {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
    pub approved: bool,
    pub comments: Option<String>,
}

impl EvaluateFormatoA {
    pub fn new(submission_id: SubmissionId, actor: Actor, approved: bool) -> Self {
        Self {
            submission_id,
            actor,
            expected_version: None,
            approved,
            comments: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

submission_command!(EvaluateFormatoA);

/// Command to replace Formato A after a rejection.
#[derive(Debug, Clone)]
pub struct ResubmitFormatoA {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
    pub artifact: ArtifactRef,
}

impl ResubmitFormatoA {
    pub fn new(submission_id: SubmissionId, actor: Actor, artifact: ArtifactRef) -> Self {
        Self {
            submission_id,
            actor,
            expected_version: None,
            artifact,
        }
    }
}

submission_command!(ResubmitFormatoA);

/// Command to upload the anteproyecto. The actor must be the director.
#[derive(Debug, Clone)]
pub struct SubmitAnteproyecto {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
    pub artifact: ArtifactRef,
}

impl SubmitAnteproyecto {
    pub fn new(submission_id: SubmissionId, actor: Actor, artifact: ArtifactRef) -> Self {
        Self {
            submission_id,
            actor,
            expected_version: None,
            artifact,
        }
    }
}

submission_command!(SubmitAnteproyecto);

/// Command to assign the two anteproyecto evaluators.
#[derive(Debug, Clone)]
pub struct AssignEvaluators {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
    pub evaluator_1: UserId,
    pub evaluator_2: UserId,
}

impl AssignEvaluators {
    pub fn new(
        submission_id: SubmissionId,
        actor: Actor,
        evaluator_1: impl Into<UserId>,
        evaluator_2: impl Into<UserId>,
    ) -> Self {
        Self {
            submission_id,
            actor,
            expected_version: None,
            evaluator_1: evaluator_1.into(),
            evaluator_2: evaluator_2.into(),
        }
    }
}

submission_command!(AssignEvaluators);

/// Command to record the anteproyecto verdict. The actor must be an assigned evaluator.
#[derive(Debug, Clone)]
pub struct EvaluateAnteproyecto {
    pub submission_id: SubmissionId,
    pub actor: Actor,
    pub expected_version: Option<Version>,
    pub approved: bool,
    pub comments: Option<String>,
}

impl EvaluateAnteproyecto {
    pub fn new(submission_id: SubmissionId, actor: Actor, approved: bool) -> Self {
        Self {
            submission_id,
            actor,
            expected_version: None,
            approved,
            comments: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

submission_command!(EvaluateAnteproyecto);
