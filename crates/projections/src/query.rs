//! Read-only queries over the event log and the current-state view.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::{SubmissionId, UserId};
use domain::{ArtifactRef, IdentityPort, Modality, Participant};
use serde::{Deserialize, Serialize};

use crate::labels::labels_for;
use crate::read_store::ReadModelStore;
use crate::views::{CurrentStateRow, EventLogRow};
use crate::{ProjectionError, Result};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default bound on how long a single query may run.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default budget for all identity lookups made while building one view.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_millis(250);

/// A person as shown to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDto {
    pub user_id: UserId,
    pub display_name: String,
    pub email: Option<String>,
}

/// The current state of one submission, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStateDto {
    pub submission_id: SubmissionId,
    pub title: Option<String>,
    pub modality: Option<Modality>,
    pub state: String,
    pub estado_legible: String,
    pub siguiente_paso: String,
    pub terminal: bool,
    /// `None` until an event carrying the attempt number has been seen.
    pub intento: Option<u8>,
    pub formato_a: Option<ArtifactRef>,
    pub acceptance_letter: Option<ArtifactRef>,
    pub formato_a_comments: Option<String>,
    pub director: Option<PersonDto>,
    pub co_director: Option<PersonDto>,
    pub students: Vec<PersonDto>,
    pub anteproyecto: Option<ArtifactRef>,
    pub evaluators: Vec<PersonDto>,
    pub anteproyecto_approved: Option<bool>,
    pub anteproyecto_comments: Option<String>,
    pub last_applied_sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for [`QueryService::get_history`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub event_types: Vec<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    /// Keeps events whose timestamp is within `[from, to]`.
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    fn matches(&self, entry: &EventLogRow) -> bool {
        (self.event_types.is_empty() || self.event_types.contains(&entry.event_type))
            && self.from.is_none_or(|from| entry.timestamp >= from)
            && self.to.is_none_or(|to| entry.timestamp <= to)
    }
}

/// A 1-based page request. Out-of-range sizes are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of a submission's history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<EventLogRow>,
    pub page: u32,
    pub size: u32,
    pub total_entries: u64,
    pub total_pages: u32,
}

/// How a user takes part in a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectRole {
    Director,
    CoDirector,
    Student,
}

/// A submission in which a given user takes part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub submission_id: SubmissionId,
    pub title: Option<String>,
    pub state: String,
    pub estado_legible: String,
    pub terminal: bool,
    pub role: SubjectRole,
    pub updated_at: DateTime<Utc>,
}

/// Answers read-side questions.
///
/// Every query works on cloned, fully committed rows and never touches the
/// write side.
pub struct QueryService<R: ReadModelStore> {
    store: R,
    identity: Option<Arc<dyn IdentityPort>>,
    timeout: Duration,
    identity_timeout: Duration,
}

impl<R: ReadModelStore> QueryService<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            identity: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
            identity_timeout: DEFAULT_IDENTITY_TIMEOUT,
        }
    }

    /// Resolves display names through `identity`.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityPort>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the bound applied to every query.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long identity lookups for one view may take in total.
    ///
    /// Never more than half the query bound, so a slow directory degrades
    /// names instead of failing the read.
    pub fn with_identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    fn identity_deadline(&self) -> Instant {
        Instant::now() + self.identity_timeout.min(self.timeout / 2)
    }

    /// Returns the current state, or `None` if the submission has never been seen.
    #[tracing::instrument(skip(self))]
    pub async fn get_current_state(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Option<SubmissionStateDto>> {
        bounded(self.timeout, async {
            match self.store.load_row(submission_id).await? {
                Some(row) => Ok(Some(self.to_dto(row).await)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Returns one page of history.
    pub async fn get_history(
        &self,
        submission_id: SubmissionId,
        query: &HistoryQuery,
        page: PageRequest,
    ) -> Result<HistoryPage> {
        self.get_history_within(submission_id, query, page, self.timeout)
            .await
    }

    /// Like [`get_history`](Self::get_history) with an explicit time limit.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_history_within(
        &self,
        submission_id: SubmissionId,
        query: &HistoryQuery,
        page: PageRequest,
        timeout: Duration,
    ) -> Result<HistoryPage> {
        let started = Instant::now();
        let result = bounded(timeout, async {
            let mut entries = self.store.event_log(submission_id).await?;
            entries.retain(|entry| query.matches(entry));
            entries.sort_by(|a, b| {
                b.timestamp
                    .cmp(&a.timestamp)
                    .then_with(|| a.event_id.cmp(&b.event_id))
            });

            let total_entries = entries.len() as u64;
            let total_pages = total_entries.div_ceil(u64::from(page.size())) as u32;
            let entries = entries
                .into_iter()
                .skip(page.offset())
                .take(page.size() as usize)
                .collect();

            Ok(HistoryPage {
                entries,
                page: page.page(),
                size: page.size(),
                total_entries,
                total_pages,
            })
        })
        .await;

        metrics::histogram!("query_history_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// Lists submissions in which `user_id` is director, co-director or student,
    /// most recently updated first.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_subject_role(&self, user_id: UserId) -> Result<Vec<SubmissionSummary>> {
        bounded(self.timeout, async {
            let rows = self.store.rows_involving(user_id).await?;
            let mut summaries: Vec<SubmissionSummary> = rows
                .into_iter()
                .filter_map(|row| {
                    let role = subject_role(&row, user_id)?;
                    let labels = labels_for(&row.state);
                    Some(SubmissionSummary {
                        submission_id: row.submission_id,
                        title: row.details.get().map(|details| details.title.clone()),
                        state: row.state,
                        estado_legible: labels.estado_legible.to_string(),
                        terminal: labels.terminal,
                        role,
                        updated_at: row.updated_at,
                    })
                })
                .collect();

            summaries.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then_with(|| a.submission_id.cmp(&b.submission_id))
            });
            Ok(summaries)
        })
        .await
    }

    async fn to_dto(&self, row: CurrentStateRow) -> SubmissionStateDto {
        let labels = labels_for(&row.state);
        let deadline = self.identity_deadline();

        let (director, co_director, students) = match row.participants() {
            Some(participants) => {
                let director = self.person(&participants.director, deadline).await;
                let co_director = match &participants.co_director {
                    Some(co_director) => Some(self.person(co_director, deadline).await),
                    None => None,
                };
                let mut students = vec![self.person(&participants.student_1, deadline).await];
                if let Some(student_2) = &participants.student_2 {
                    students.push(self.person(student_2, deadline).await);
                }
                (Some(director), co_director, students)
            }
            None => (None, None, Vec::new()),
        };

        let mut evaluators = Vec::new();
        if let Some((first, second)) = row.evaluators.get() {
            for id in [*first, *second] {
                evaluators.push(self.person_by_id(id, None, deadline).await);
            }
        }

        let registration = row.registration.get();
        let outcome = row.outcome.get();

        SubmissionStateDto {
            submission_id: row.submission_id,
            title: row.details.get().map(|details| details.title.clone()),
            modality: registration.map(|registration| registration.modality),
            estado_legible: labels.estado_legible.to_string(),
            siguiente_paso: labels.siguiente_paso.to_string(),
            terminal: labels.terminal,
            intento: row.intento.get().copied(),
            formato_a: row.formato_a.get().cloned(),
            acceptance_letter: registration.and_then(|r| r.acceptance_letter.clone()),
            formato_a_comments: row.formato_a_comments.get().cloned(),
            director,
            co_director,
            students,
            anteproyecto: row.anteproyecto.get().cloned(),
            evaluators,
            anteproyecto_approved: outcome.map(|o| o.approved),
            anteproyecto_comments: outcome.and_then(|o| o.comments.clone()),
            last_applied_sequence: row.last_applied_sequence.as_i64(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            state: row.state,
        }
    }

    async fn person(&self, participant: &Participant, deadline: Instant) -> PersonDto {
        self.person_by_id(participant.id, Some(&participant.name), deadline)
            .await
    }

    /// Directory entry first, then the name carried by events, then a placeholder.
    ///
    /// Lookups still pending at `deadline` fall through to the fallbacks.
    async fn person_by_id(
        &self,
        user_id: UserId,
        known_name: Option<&str>,
        deadline: Instant,
    ) -> PersonDto {
        if let Some(identity) = &self.identity {
            let lookup = identity.resolve(user_id);
            match tokio::time::timeout_at(deadline.into(), lookup).await {
                Ok(Ok(profile)) => {
                    return PersonDto {
                        user_id,
                        display_name: profile.display_name,
                        email: Some(profile.email),
                    };
                }
                Ok(Err(err)) => {
                    tracing::debug!(%user_id, error = %err, "identity lookup failed");
                }
                Err(_) => {
                    metrics::counter!("identity_lookup_timeouts_total").increment(1);
                    tracing::warn!(%user_id, "identity lookup timed out");
                }
            }
        }

        let display_name = known_name
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_name(user_id));

        PersonDto {
            user_id,
            display_name,
            email: None,
        }
    }
}

/// Display name used when nothing better is known.
pub fn placeholder_name(user_id: UserId) -> String {
    format!("Usuario #{user_id}")
}

fn subject_role(row: &CurrentStateRow, user_id: UserId) -> Option<SubjectRole> {
    let participants = row.participants()?;
    if participants.director.id == user_id {
        Some(SubjectRole::Director)
    } else if participants
        .co_director
        .as_ref()
        .is_some_and(|co_director| co_director.id == user_id)
    {
        Some(SubjectRole::CoDirector)
    } else if participants.is_student(user_id) {
        Some(SubjectRole::Student)
    } else {
        None
    }
}

async fn bounded<T>(limit: Duration, query: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, query).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?limit, "query timed out");
            Err(ProjectionError::Timeout(limit))
        }
    }
}
