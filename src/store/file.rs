//! File-backed checkpoint store.
//!
//! One pretty-printed JSON file per thread. Writes go to a temporary file
//! that is renamed over the checkpoint, so a crash mid-write leaves the
//! previous snapshot intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{validate_thread_id, StateStore, StoreError};
use crate::pipeline::ThreadState;

/// Directory of `<thread_id>.json` checkpoints.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf, StoreError> {
        validate_thread_id(thread_id)?;
        Ok(self.dir.join(format!("{thread_id}.json")))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io { path: path.to_path_buf(), source }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, thread_id: &str) -> Result<Option<ThreadState>, StoreError> {
        let path = self.path_for(thread_id)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt { thread_id: thread_id.to_string(), message: e.to_string() })
    }

    async fn put(&self, state: &ThreadState) -> Result<(), StoreError> {
        let path = self.path_for(&state.thread_id)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| io_error(&self.dir, e))?;

        let content = serde_json::to_string_pretty(state).map_err(|e| StoreError::Corrupt {
            thread_id: state.thread_id.clone(),
            message: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| io_error(&path, e))?;

        tracing::trace!(thread_id = %state.thread_id, path = %path.display(), "Checkpoint written");
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_thread_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &str {
        "file"
    }
}
