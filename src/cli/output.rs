//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, StorageError, ViewError};

/// Map domain errors to a one-line message for the terminal.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::View(ViewError::Storage(StorageError::StateNotFound(key)))
        | ApiError::StorageError(StorageError::StateNotFound(key)) => {
            format!("No captured state for {}", key)
        }
        ApiError::View(ViewError::SecurityBypassAttempt { key, reason }) => {
            format!("Refused: {} ({})", reason, key)
        }
        other => other.to_string(),
    }
}
