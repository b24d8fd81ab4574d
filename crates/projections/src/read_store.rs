//! Storage for the event log and current-state rows.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{SubmissionId, UserId};
use dashmap::DashMap;
use event_store::EventId;
use tokio::sync::RwLock;

use crate::views::{CurrentStateRow, EventLogRow};
use crate::{ProjectionError, Result};

/// What happened to a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The log entry and the row were written together.
    Committed,
    /// The log already held this event id; nothing was written.
    Duplicate,
}

/// Backing store for the read side.
///
/// A commit writes one event log entry and the updated row as a unit. The row
/// is only replaced if its stored revision still equals `expected_revision`
/// (0 for a row that has never been stored), so two writers racing on the same
/// submission cannot lose each other's changes.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    async fn has_event(&self, event_id: EventId) -> Result<bool>;

    async fn load_row(&self, submission_id: SubmissionId) -> Result<Option<CurrentStateRow>>;

    async fn commit(
        &self,
        entry: EventLogRow,
        row: CurrentStateRow,
        expected_revision: u64,
    ) -> Result<CommitOutcome>;

    /// All logged events for a submission, in the order they were committed.
    async fn event_log(&self, submission_id: SubmissionId) -> Result<Vec<EventLogRow>>;

    /// Rows whose participants include `user_id` in any slot.
    async fn rows_involving(&self, user_id: UserId) -> Result<Vec<CurrentStateRow>>;

    async fn rows(&self) -> Result<Vec<CurrentStateRow>>;

    /// Drops every row and log entry. Used before a rebuild.
    async fn clear(&self) -> Result<()>;
}

/// Everything stored for one submission.
#[derive(Debug, Default)]
struct Partition {
    row: Option<CurrentStateRow>,
    log: Vec<EventLogRow>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_commits: AtomicU32,
    read_delay: RwLock<Option<Duration>>,
}

/// In-memory read store.
///
/// Rows and log entries are partitioned by submission in a [`DashMap`], so a
/// commit only locks the shard holding its own submission. Event ids are
/// indexed separately for the duplicate check.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReadStore {
    partitions: Arc<DashMap<SubmissionId, Partition>>,
    event_ids: Arc<DashMap<EventId, SubmissionId>>,
    faults: Arc<Faults>,
}

impl InMemoryReadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with a transient error.
    pub async fn fail_next_commits(&self, count: u32) {
        self.faults.fail_next_commits.store(count, Ordering::SeqCst);
    }

    /// Delays every read by `delay`.
    pub async fn set_read_delay(&self, delay: Option<Duration>) {
        *self.faults.read_delay.write().await = delay;
    }

    pub async fn event_count(&self) -> usize {
        self.event_ids.len()
    }

    pub async fn row_count(&self) -> usize {
        self.partitions
            .iter()
            .filter(|partition| partition.row.is_some())
            .count()
    }

    async fn pause(&self) {
        let delay = *self.faults.read_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.faults
            .fail_next_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn rows_matching(&self, keep: impl Fn(&CurrentStateRow) -> bool) -> Vec<CurrentStateRow> {
        self.partitions
            .iter()
            .filter_map(|partition| partition.row.as_ref().filter(|row| keep(row)).cloned())
            .collect()
    }
}

#[async_trait]
impl ReadModelStore for InMemoryReadStore {
    async fn has_event(&self, event_id: EventId) -> Result<bool> {
        Ok(self.event_ids.contains_key(&event_id))
    }

    async fn load_row(&self, submission_id: SubmissionId) -> Result<Option<CurrentStateRow>> {
        self.pause().await;
        Ok(self
            .partitions
            .get(&submission_id)
            .and_then(|partition| partition.row.clone()))
    }

    async fn commit(
        &self,
        entry: EventLogRow,
        mut row: CurrentStateRow,
        expected_revision: u64,
    ) -> Result<CommitOutcome> {
        if self.take_injected_failure() {
            return Err(ProjectionError::Apply("read store unavailable".to_string()));
        }

        let mut partition = self.partitions.entry(row.submission_id).or_default();

        if self.event_ids.contains_key(&entry.event_id) {
            return Ok(CommitOutcome::Duplicate);
        }

        let stored_revision = partition.row.as_ref().map(|stored| stored.revision).unwrap_or(0);
        if stored_revision != expected_revision {
            return Err(ProjectionError::Conflict {
                submission_id: row.submission_id,
                expected: expected_revision,
            });
        }

        row.revision = expected_revision + 1;
        self.event_ids.insert(entry.event_id, entry.submission_id);
        partition.log.push(entry);
        partition.row = Some(row);

        Ok(CommitOutcome::Committed)
    }

    async fn event_log(&self, submission_id: SubmissionId) -> Result<Vec<EventLogRow>> {
        self.pause().await;
        Ok(self
            .partitions
            .get(&submission_id)
            .map(|partition| partition.log.clone())
            .unwrap_or_default())
    }

    async fn rows_involving(&self, user_id: UserId) -> Result<Vec<CurrentStateRow>> {
        self.pause().await;
        Ok(self.rows_matching(|row| {
            row.participants()
                .is_some_and(|participants| participants.all_ids().contains(&user_id))
        }))
    }

    async fn rows(&self) -> Result<Vec<CurrentStateRow>> {
        self.pause().await;
        Ok(self.rows_matching(|_| true))
    }

    async fn clear(&self) -> Result<()> {
        self.partitions.clear();
        self.event_ids.clear();
        Ok(())
    }
}
