//! File storage port and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::PortError;
use crate::submission::ArtifactRef;

/// Stores uploaded documents and hands back opaque references.
#[async_trait]
pub trait FileStoragePort: Send + Sync {
    /// Stores a document and returns its reference.
    async fn store(&self, bytes: Vec<u8>, name: &str) -> Result<ArtifactRef, PortError>;

    /// Fetches a previously stored document.
    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, PortError>;
}

#[derive(Debug, Default)]
struct InMemoryStorageState {
    files: HashMap<ArtifactRef, Vec<u8>>,
    next_id: u32,
    fail_on_store: bool,
}

/// In-memory file storage for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStorage {
    state: Arc<RwLock<InMemoryStorageState>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the storage to fail on store calls.
    pub fn set_fail_on_store(&self, fail: bool) {
        self.state.write().unwrap().fail_on_store = fail;
    }

    /// Returns the number of stored documents.
    pub fn file_count(&self) -> usize {
        self.state.read().unwrap().files.len()
    }
}

#[async_trait]
impl FileStoragePort for InMemoryFileStorage {
    async fn store(&self, bytes: Vec<u8>, name: &str) -> Result<ArtifactRef, PortError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_store {
            return Err(PortError::Storage("storage unavailable".to_string()));
        }

        state.next_id += 1;
        let artifact = ArtifactRef::new(format!("mem://{}/{}", state.next_id, name));
        state.files.insert(artifact.clone(), bytes);
        Ok(artifact)
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, PortError> {
        self.state
            .read()
            .unwrap()
            .files
            .get(artifact)
            .cloned()
            .ok_or_else(|| PortError::ArtifactNotFound(artifact.clone()))
    }
}
