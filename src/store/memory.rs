//! In-memory checkpoint store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{StateStore, StoreError};
use crate::pipeline::ThreadState;

/// Process-local store. Snapshots are cloned in and out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: RwLock<HashMap<String, ThreadState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored threads.
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, thread_id: &str) -> Result<Option<ThreadState>, StoreError> {
        Ok(self.threads.read().get(thread_id).cloned())
    }

    async fn put(&self, state: &ThreadState) -> Result<(), StoreError> {
        self.threads.write().insert(state.thread_id.clone(), state.clone());
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.threads.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
