//! Error types for the flowshell view control layer.

use crate::types::{PageId, ViewKey};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Captured state not found: {0}")]
    StateNotFound(ViewKey),

    #[error("Corrupt state record: {0}")]
    Corrupt(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures reported by the content layer collaborator.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content pane not found: {0}")]
    PaneNotFound(ViewKey),

    #[error("Load failed for {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("External open failed for {url}: {reason}")]
    ExternalOpenFailed { url: String, reason: String },
}

/// View control errors.
///
/// Structural errors are returned to the caller. Restore and security
/// outcomes are not errors; they travel through the notification relay.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("View already exists: {0}")]
    DuplicateView(ViewKey),

    #[error("No such view: {0}")]
    NoSuchView(ViewKey),

    #[error("No view with page id '{0}'")]
    NoSuchPage(PageId),

    #[error("Page id '{0}' exists in more than one flow; a flow id is required")]
    AmbiguousPage(PageId),

    #[error("Security bypass attempt rejected for {key}: {reason}")]
    SecurityBypassAttempt { key: ViewKey, reason: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Application-level errors (configuration, logging, CLI).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
