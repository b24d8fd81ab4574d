//! Value objects for the submission domain.

use common::UserId;
use serde::{Deserialize, Serialize};

use super::SubmissionError;

/// Hard ceiling on Formato A attempts.
pub const MAX_FORMATO_A_ATTEMPTS: u8 = 3;

/// Opaque reference to a stored document.
///
/// Produced by the file storage port; the workflow never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Degree modality. Determines how many students may participate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// Research project, one or two students.
    Investigacion,
    /// Internship, exactly one student and a company acceptance letter.
    PracticaProfesional,
}

impl Modality {
    /// Maximum number of students allowed.
    pub fn max_students(&self) -> usize {
        match self {
            Modality::Investigacion => 2,
            Modality::PracticaProfesional => 1,
        }
    }

    /// Whether Formato A must come with an acceptance letter.
    pub fn requires_acceptance_letter(&self) -> bool {
        matches!(self, Modality::PracticaProfesional)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Investigacion => "Investigacion",
            Modality::PracticaProfesional => "PracticaProfesional",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A person taking part in a submission, with the name shown to others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub name: String,
}

impl Participant {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Director, optional co-director and one or two students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants {
    pub director: Participant,
    pub co_director: Option<Participant>,
    pub student_1: Participant,
    pub student_2: Option<Participant>,
}

impl Participants {
    /// Creates the minimal set: a director and one student.
    pub fn new(director: Participant, student_1: Participant) -> Self {
        Self {
            director,
            co_director: None,
            student_1,
            student_2: None,
        }
    }

    pub fn with_co_director(mut self, co_director: Participant) -> Self {
        self.co_director = Some(co_director);
        self
    }

    pub fn with_second_student(mut self, student_2: Participant) -> Self {
        self.student_2 = Some(student_2);
        self
    }

    /// Number of students filled in.
    pub fn student_count(&self) -> usize {
        1 + usize::from(self.student_2.is_some())
    }

    /// Ids of the students.
    pub fn student_ids(&self) -> Vec<UserId> {
        std::iter::once(self.student_1.id)
            .chain(self.student_2.as_ref().map(|s| s.id))
            .collect()
    }

    /// Everyone involved, director first.
    pub fn all_ids(&self) -> Vec<UserId> {
        let mut ids = vec![self.director.id];
        ids.extend(self.co_director.as_ref().map(|p| p.id));
        ids.extend(self.student_ids());
        ids
    }

    pub fn is_director(&self, user_id: UserId) -> bool {
        self.director.id == user_id
    }

    pub fn is_student(&self, user_id: UserId) -> bool {
        self.student_ids().contains(&user_id)
    }

    /// Checks the slots against the modality.
    pub fn validate(&self, modality: Modality) -> Result<(), SubmissionError> {
        if self.student_count() > modality.max_students() {
            return Err(SubmissionError::InvalidParticipants(format!(
                "{} allows at most {} student(s)",
                modality,
                modality.max_students()
            )));
        }
        if let Some(co_director) = &self.co_director
            && co_director.id == self.director.id
        {
            return Err(SubmissionError::InvalidParticipants(
                "co-director must differ from director".to_string(),
            ));
        }
        if self.is_student(self.director.id) {
            return Err(SubmissionError::InvalidParticipants(
                "director cannot also be a student".to_string(),
            ));
        }
        if let Some(student_2) = &self.student_2
            && student_2.id == self.student_1.id
        {
            return Err(SubmissionError::InvalidParticipants(
                "students must be different people".to_string(),
            ));
        }
        Ok(())
    }
}

/// Write-side data about the Formato A document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatoAInfo {
    /// Current attempt, 1..=3.
    pub intento: u8,
    pub artifact: ArtifactRef,
    pub acceptance_letter: Option<ArtifactRef>,
    pub last_comments: Option<String>,
}

impl FormatoAInfo {
    pub fn first_attempt(artifact: ArtifactRef, acceptance_letter: Option<ArtifactRef>) -> Self {
        Self {
            intento: 1,
            artifact,
            acceptance_letter,
            last_comments: None,
        }
    }

    pub fn has_attempts_left(&self) -> bool {
        self.intento < MAX_FORMATO_A_ATTEMPTS
    }
}

/// Write-side data about the Anteproyecto. Exists only after Formato A approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnteproyectoInfo {
    pub artifact: ArtifactRef,
    pub evaluators: Option<(UserId, UserId)>,
    pub approved: Option<bool>,
    pub comments: Option<String>,
}

impl AnteproyectoInfo {
    pub fn submitted(artifact: ArtifactRef) -> Self {
        Self {
            artifact,
            evaluators: None,
            approved: None,
            comments: None,
        }
    }

    pub fn is_evaluator(&self, user_id: UserId) -> bool {
        matches!(self.evaluators, Some((a, b)) if a == user_id || b == user_id)
    }
}
