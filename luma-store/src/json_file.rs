//! JSON file store.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous state intact.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::repository::StateRepository;
use crate::state::PersistedState;

/// Default file name inside the data directory
pub const STATE_FILE_NAME: &str = "luma_state.json";

/// File-backed state store.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/luma_state.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(STATE_FILE_NAME))
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STATE_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Write `bytes` to `path` atomically (temp file + rename).
pub async fn write_atomic(path: &Path, temp: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(temp, bytes).await?;
    tokio::fs::rename(temp, path).await?;
    Ok(())
}

#[async_trait]
impl StateRepository for JsonFileStore {
    async fn load(&self) -> Result<PersistedState, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting fresh");
                return Ok(PersistedState::default());
            },
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "State file unreadable");
            StoreError::corrupted(self.path.display().to_string(), e.to_string())
        })
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let mut stamped = state.clone();
        stamped.saved_at = Some(Utc::now());
        let bytes = serde_json::to_vec_pretty(&stamped)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &self.temp_path(), &bytes).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "State saved");
        Ok(())
    }
}
