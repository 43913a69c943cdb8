//! Durable "last seen" record.

use async_trait::async_trait;
use shared_types::SeenState;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
#[cfg(test)]
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Seen state I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize seen state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Whole-record store for [`SeenState`].
///
/// A reader observes either the previous record or the new one, never a mix.
#[async_trait]
pub trait SeenStateStore: Send + Sync {
    async fn read(&self) -> Result<SeenState, StateError>;
    async fn write(&self, state: &SeenState) -> Result<(), StateError>;
}

/// JSON file store. Writes go to a sibling temp file which is then renamed
/// over the record.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    async fn replace_via(&self, temp: &Path, json: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(temp).await?;
        file.write_all(json).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(temp, &self.path).await
    }

    /// Makes the rename itself durable
    #[cfg(unix)]
    async fn sync_parent_dir(&self) {
        let dir = self.parent_dir();
        let synced = match tokio::fs::File::open(dir).await {
            Ok(handle) => handle.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            tracing::warn!("Failed to sync directory {}: {}", dir.display(), e);
        }
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) {}
}

#[async_trait]
impl SeenStateStore for JsonFileStore {
    async fn read(&self) -> Result<SeenState, StateError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SeenState::default()),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    "Seen state at {} is unreadable ({}), starting fresh",
                    self.path.display(),
                    e
                );
                Ok(SeenState::default())
            }
        }
    }

    async fn write(&self, state: &SeenState) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(state)?;
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(self.parent_dir())
            .await
            .map_err(|e| self.io_error(e))?;

        let temp = self.temp_path();
        if let Err(e) = self.replace_via(&temp, &json).await {
            match tokio::fs::remove_file(&temp).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => tracing::warn!(
                    "Failed to remove {}: {}",
                    temp.display(),
                    cleanup
                ),
            }
            return Err(self.io_error(e));
        }
        self.sync_parent_dir().await;

        tracing::debug!("Seen state written to {}", self.path.display());
        Ok(())
    }
}

/// In-process store for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<SeenState>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new(state: SeenState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl SeenStateStore for MemoryStore {
    async fn read(&self) -> Result<SeenState, StateError> {
        Ok(self.state.read().await.clone())
    }

    async fn write(&self, state: &SeenState) -> Result<(), StateError> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}
