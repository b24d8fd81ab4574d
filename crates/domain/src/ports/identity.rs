//! Identity lookup port and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};

use super::PortError;

/// Display data for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
}

impl UserProfile {
    pub fn new(
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            email: email.into(),
        }
    }
}

/// Resolves user ids to display data.
#[async_trait]
pub trait IdentityPort: Send + Sync {
    async fn resolve(&self, user_id: UserId) -> Result<UserProfile, PortError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    profiles: HashMap<UserId, UserProfile>,
    fail_on_resolve: bool,
}

/// In-memory user directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile.
    pub fn insert(&self, profile: UserProfile) {
        self.state
            .write()
            .unwrap()
            .profiles
            .insert(profile.user_id, profile);
    }

    /// Configures the directory to fail every lookup.
    pub fn set_fail_on_resolve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_resolve = fail;
    }
}

#[async_trait]
impl IdentityPort for InMemoryIdentityDirectory {
    async fn resolve(&self, user_id: UserId) -> Result<UserProfile, PortError> {
        let state = self.state.read().unwrap();
        if state.fail_on_resolve {
            return Err(PortError::Identity("directory unavailable".to_string()));
        }
        state
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::Identity(format!("unknown user {user_id}")))
    }
}
