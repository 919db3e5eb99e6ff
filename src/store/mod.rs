//! Checkpoint storage for report threads.
//!
//! A [`StateStore`] maps a thread id to the latest [`ThreadState`] snapshot.
//! Stores are last-writer-wins per key; callers that mutate a thread hold
//! that thread's guard from [`ThreadLocks`] so writes to one thread are
//! serialized while different threads proceed independently.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::pipeline::ThreadState;

/// Errors raised by checkpoint stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing a checkpoint file failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint exists but cannot be decoded.
    #[error("Checkpoint for '{thread_id}' is corrupt: {message}")]
    Corrupt { thread_id: String, message: String },

    /// The thread id cannot be used as a storage key.
    #[error("Invalid thread id '{0}'")]
    InvalidId(String),
}

/// Keyed checkpoint storage.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the latest snapshot for a thread.
    async fn get(&self, thread_id: &str) -> Result<Option<ThreadState>, StoreError>;

    /// Replace the snapshot for `state.thread_id`.
    async fn put(&self, state: &ThreadState) -> Result<(), StoreError>;

    /// Ids of all stored threads, sorted.
    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Every stored snapshot, oldest first.
    async fn list_threads(&self) -> Result<Vec<ThreadState>, StoreError> {
        let mut threads = Vec::new();
        for id in self.list_ids().await? {
            if let Some(state) = self.get(&id).await? {
                threads.push(state);
            }
        }
        threads.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(threads)
    }

    /// Get the backend name.
    fn name(&self) -> &str;
}

/// Thread ids are used as file names, so only a safe alphabet is accepted.
pub fn validate_thread_id(thread_id: &str) -> Result<(), StoreError> {
    let valid = !thread_id.is_empty()
        && thread_id.len() <= 128
        && thread_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(thread_id.to_string()))
    }
}

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Per-thread mutual exclusion.
///
/// Entries live only while some task holds or waits for them.
#[derive(Debug, Default)]
pub struct ThreadLocks {
    locks: LockTable,
}

impl ThreadLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`.
    ///
    /// The guard is owned so it can be held across await points and moved
    /// into spawned tasks.
    pub async fn lock(&self, thread_id: &str) -> ThreadGuard {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        let guard = lock.lock_owned().await;

        ThreadGuard { guard: Some(guard), thread_id: thread_id.to_string(), table: self.locks.clone() }
    }

    /// Whether some task currently holds `thread_id`.
    pub fn is_locked(&self, thread_id: &str) -> bool {
        self.locks.lock().get(thread_id).is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of thread ids with a holder or waiter.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether no thread is locked or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one thread, released on drop.
#[derive(Debug)]
pub struct ThreadGuard {
    guard: Option<OwnedMutexGuard<()>>,
    thread_id: String,
    table: LockTable,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        // Waiters clone the entry under the table lock, so a count of one
        // after release means nobody else wants it.
        let mut locks = self.table.lock();
        drop(self.guard.take());
        if locks.get(&self.thread_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.thread_id);
        }
    }
}
