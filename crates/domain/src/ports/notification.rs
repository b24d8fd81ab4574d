//! Notification port and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SubmissionId, UserId};

use super::PortError;

/// A message about a workflow step, addressed to users.
///
/// Content and delivery channel are up to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub submission_id: SubmissionId,
    pub event_type: String,
    pub recipients: Vec<UserId>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        submission_id: SubmissionId,
        event_type: impl Into<String>,
        recipients: Vec<UserId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            submission_id,
            event_type: event_type.into(),
            recipients,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Fire-and-forget notification hook.
///
/// Called after a transition has been committed; failures never undo it.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), PortError>;
}

#[derive(Debug, Default)]
struct NotifierState {
    sent: Vec<Notification>,
    fail_on_notify: bool,
}

/// In-memory notifier that records what it was asked to send.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<NotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every call.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.state.write().unwrap().fail_on_notify = fail;
    }

    /// Returns every notification accepted so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl NotificationPort for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PortError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_notify {
            return Err(PortError::Notification("mail relay down".to_string()));
        }
        state.sent.push(notification);
        Ok(())
    }
}
