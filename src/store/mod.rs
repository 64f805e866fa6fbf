//! Captured-state store.
//!
//! Durable home of [`CapturedState`] records, one per `(flow, page)`. A new
//! capture overwrites the previous record for its key; records are never
//! deleted by the shell.

pub mod persistence;

pub use persistence::SledStateStore;

use crate::capture::CapturedState;
use crate::error::StorageError;
use crate::types::ViewKey;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Captured-state store interface
pub trait StateStore: Send + Sync {
    fn get(&self, key: &ViewKey) -> Result<Option<CapturedState>, StorageError>;
    fn put(&self, state: &CapturedState) -> Result<(), StorageError>;
    fn list_all(&self) -> Result<Vec<CapturedState>, StorageError>;

    /// Flush pending writes. Stores without buffering need not override.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Volatile store for tests and ephemeral shells.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: RwLock<BTreeMap<ViewKey, CapturedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &ViewKey) -> Result<Option<CapturedState>, StorageError> {
        Ok(self.records.read().get(key).cloned())
    }

    fn put(&self, state: &CapturedState) -> Result<(), StorageError> {
        self.records.write().insert(state.key.clone(), state.clone());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<CapturedState>, StorageError> {
        Ok(self.records.read().values().cloned().collect())
    }
}
