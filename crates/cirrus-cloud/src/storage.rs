//! Object storage used to stage bootstrap artifacts

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Write/read store for bootstrap artifacts
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Removing a missing file is not an error
    async fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// Storage held in process memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;
        self.files
            .lock()
            .await
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;
        self.files
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        self.files.lock().await.remove(name);
        Ok(())
    }
}

/// Storage backed by a local directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(name)?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
                tracing::debug!("Created storage directory: {}", parent.display());
            }
        }
        fs::write(&path, data).await?;
        tracing::debug!(name, bytes = data.len(), "stored file");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Names are relative paths without `..`, roots or prefixes
fn validate_name(name: &str) -> Result<(), StorageError> {
    let path = Path::new(name);
    let valid = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
