//! On-disk transcript artifacts, one pretty-printed JSON file per rollout.

use std::path::{Path, PathBuf};

use crate::domain::errors::RolloutError;
use crate::domain::models::Transcript;

/// Writes and reads `rollout_{index:03}.json` files under one directory.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, rollout_index: u32) -> PathBuf {
        self.dir.join(format!("rollout_{rollout_index:03}.json"))
    }

    /// Write a transcript whatever its status. Creates the directory if needed.
    pub async fn write(&self, transcript: &Transcript) -> Result<PathBuf, RolloutError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(transcript.metadata.rollout_index);
        let json = serde_json::to_string_pretty(transcript)?;
        tokio::fs::write(&path, json).await?;

        tracing::info!(
            rollout = transcript.metadata.rollout_index,
            status = transcript.metadata.status.as_str(),
            turns = transcript.turn_count(),
            path = %path.display(),
            "transcript written"
        );
        Ok(path)
    }

    pub async fn read(&self, rollout_index: u32) -> Result<Transcript, RolloutError> {
        let content = tokio::fs::read_to_string(self.path_for(rollout_index)).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_naming() {
        let store = TranscriptStore::new("/tmp/out");
        assert_eq!(store.path_for(7), PathBuf::from("/tmp/out/rollout_007.json"));
        assert_eq!(store.path_for(1234), PathBuf::from("/tmp/out/rollout_1234.json"));
    }

    #[tokio::test]
    async fn test_read_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        assert!(matches!(store.read(0).await, Err(RolloutError::Io(_))));
    }
}
