//! Provider state
//!
//! Bootstrap records the control instance in the `provider-state` document
//! in the environment's storage. Its presence is what marks an environment as
//! bootstrapped.

use crate::error::StorageError;
use crate::instance::InstanceId;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const STATE_VERSION: u32 = 1;
pub const STATE_FILE: &str = "provider-state";

/// Contents of the provider-state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderState {
    /// State file version
    pub version: u32,

    /// Instances running the orchestrator's state server
    pub state_instances: Vec<InstanceId>,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,
}

impl ProviderState {
    pub fn new(state_instances: Vec<InstanceId>) -> Self {
        Self {
            version: STATE_VERSION,
            state_instances,
            updated_at: Utc::now(),
        }
    }
}

/// Reads and writes the provider-state document
#[derive(Clone)]
pub struct StateStore {
    storage: Arc<dyn Storage>,
}

impl StateStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the current state; [`StorageError::NotFound`] if never bootstrapped
    pub async fn load(&self) -> Result<ProviderState, StorageError> {
        let content = self.storage.get(STATE_FILE).await?;
        let state: ProviderState =
            serde_json::from_slice(&content).map_err(|e| StorageError::Corrupt {
                name: STATE_FILE.to_string(),
                reason: e.to_string(),
            })?;

        // Version check
        if state.version > STATE_VERSION {
            return Err(StorageError::Corrupt {
                name: STATE_FILE.to_string(),
                reason: format!(
                    "state file version {} is newer than supported version {}",
                    state.version, STATE_VERSION
                ),
            });
        }

        tracing::debug!(instances = state.state_instances.len(), "loaded provider state");
        Ok(state)
    }

    /// Whether a provider-state document exists
    pub async fn exists(&self) -> Result<bool, StorageError> {
        match self.storage.get(STATE_FILE).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, state: &ProviderState) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(state).map_err(|e| StorageError::Corrupt {
            name: STATE_FILE.to_string(),
            reason: e.to_string(),
        })?;
        self.storage.put(STATE_FILE, &content).await?;

        tracing::debug!(instances = state.state_instances.len(), "saved provider state");
        Ok(())
    }

    pub async fn remove(&self) -> Result<(), StorageError> {
        self.storage.remove(STATE_FILE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(Arc::new(FileStorage::new(temp_dir.path())));

        let state = ProviderState::new(vec![InstanceId::new("d8e02d56")]);
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.state_instances, vec![InstanceId::new("d8e02d56")]);
        assert!(temp_dir.path().join(STATE_FILE).exists());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let store = StateStore::new(Arc::new(MemoryStorage::new()));
        assert!(!store.exists().await.unwrap());
        assert!(matches!(store.load().await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let mut state = ProviderState::new(Vec::new());
        state.version = STATE_VERSION + 1;
        storage
            .put(STATE_FILE, &serde_json::to_vec(&state).unwrap())
            .await
            .unwrap();

        let store = StateStore::new(storage);
        assert!(matches!(store.load().await, Err(StorageError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = StateStore::new(Arc::new(MemoryStorage::new()));
        store.save(&ProviderState::new(Vec::new())).await.unwrap();
        assert!(store.exists().await.unwrap());

        store.remove().await.unwrap();
        assert!(!store.exists().await.unwrap());
    }
}
