//! Persistence layer for the captured-state store

use crate::capture::CapturedState;
use crate::error::StorageError;
use crate::store::StateStore;
use crate::types::ViewKey;
use bincode;
use sled;
use std::path::Path;

const STATE_TREE: &str = "captured_state";

/// Sled-based implementation of StateStore
///
/// Records live in their own tree so the database can be shared with other
/// shell data. Keys are [`ViewKey::storage_key`]; values are bincode.
pub struct SledStateStore {
    db: sled::Db,
    tree: sled::Tree,
}

fn io_error(kind: std::io::ErrorKind, context: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::IoError(std::io::Error::new(kind, format!("{}: {}", context, e)))
}

impl SledStateStore {
    /// Create a new SledStateStore at the given path
    ///
    /// The path can be a directory (sled will create a database there) or
    /// a file path (sled will use it as the database file).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)
            .map_err(|e| io_error(std::io::ErrorKind::Other, "Failed to open sled database", e))?;
        Self::from_db(db)
    }

    /// Use an already opened database.
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let tree = db
            .open_tree(STATE_TREE)
            .map_err(|e| io_error(std::io::ErrorKind::Other, "Failed to open state tree", e))?;
        Ok(Self { db, tree })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Check if a record exists for the key
    pub fn contains(&self, key: &ViewKey) -> Result<bool, StorageError> {
        self.tree.contains_key(key.storage_key()).map_err(|e| {
            io_error(std::io::ErrorKind::Other, "Failed to check state existence", e)
        })
    }

    fn decode(bytes: &[u8]) -> Result<CapturedState, StorageError> {
        bincode::deserialize(bytes).map_err(|e| {
            io_error(std::io::ErrorKind::InvalidData, "Failed to deserialize captured state", e)
        })
    }
}

impl StateStore for SledStateStore {
    fn get(&self, key: &ViewKey) -> Result<Option<CapturedState>, StorageError> {
        match self
            .tree
            .get(key.storage_key())
            .map_err(|e| io_error(std::io::ErrorKind::Other, "Failed to get captured state", e))?
        {
            Some(value) => {
                let state = Self::decode(&value)?;
                if state.key != *key {
                    return Err(StorageError::Corrupt(format!(
                        "record under {} belongs to {}",
                        key, state.key
                    )));
                }
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn put(&self, state: &CapturedState) -> Result<(), StorageError> {
        let value = bincode::serialize(state).map_err(|e| {
            io_error(std::io::ErrorKind::InvalidData, "Failed to serialize captured state", e)
        })?;
        self.tree
            .insert(state.key.storage_key(), value)
            .map_err(|e| io_error(std::io::ErrorKind::Other, "Failed to put captured state", e))?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<CapturedState>, StorageError> {
        let mut states = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item
                .map_err(|e| io_error(std::io::ErrorKind::Other, "Failed to iterate store", e))?;
            states.push(Self::decode(&value)?);
        }
        Ok(states)
    }

    /// Flush all pending writes to disk
    fn flush(&self) -> Result<(), StorageError> {
        self.tree
            .flush()
            .map_err(|e| io_error(std::io::ErrorKind::Other, "Failed to flush database", e))?;
        Ok(())
    }
}
