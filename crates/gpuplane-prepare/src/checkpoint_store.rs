//! File-backed checkpoint store.
//!
//! One JSON document per node, written atomically by writing a temp file in
//! the same directory and renaming over the target. Last write wins; any
//! process can read it back.

use crate::error::CheckpointError;
use crate::ports::CheckpointStore;
use async_trait::async_trait;
use gpuplane_model::{PrepareCheckpoint, CHECKPOINT_SCHEMA_VERSION};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Checkpoint store persisting to a single JSON file.
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store backed by `path`; the file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path the store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<PrepareCheckpoint, CheckpointError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint file, starting empty");
                return Ok(PrepareCheckpoint::default());
            }
            Err(e) => return Err(e.into()),
        };
        let checkpoint: PrepareCheckpoint =
            serde_json::from_slice(&raw).map_err(|e| CheckpointError::Decode(e.to_string()))?;
        if checkpoint.version > CHECKPOINT_SCHEMA_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_SCHEMA_VERSION,
            });
        }
        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &PrepareCheckpoint) -> Result<(), CheckpointError> {
        let encoded = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| CheckpointError::Decode(e.to_string()))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &encoded).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            claims = checkpoint.claims.len(),
            "checkpoint saved"
        );
        Ok(())
    }
}
