//! Configuration System
//!
//! Layered configuration for the shell: built-in defaults, the global
//! config file, workspace config files and `FLOWSHELL_*` environment
//! variables, in increasing precedence.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod paths;
mod sources;

pub use facade::ConfigLoader;
pub use paths::{default_config_dir, default_store_path};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Security gate policy
    #[serde(default)]
    pub security: SecurityConfig,

    /// Captured-state storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Security gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Identity providers that reject embedded browser contexts.
    /// Subdomains are matched too.
    #[serde(default = "default_blocked_auth_domains")]
    pub blocked_auth_domains: Vec<String>,

    /// Ask the user before falling back to plain HTTP after a failed upgrade
    #[serde(default = "default_true")]
    pub intercept_https_downgrade: bool,
}

pub(crate) fn default_blocked_auth_domains() -> Vec<String> {
    vec!["accounts.google.com".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            blocked_auth_domains: default_blocked_auth_domains(),
            intercept_https_downgrade: default_true(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database holding captured view state. Relative paths resolve
    /// against the workspace root.
    #[serde(default = "default_store_path")]
    pub state_path: PathBuf,

    /// Capture the previously active view when another view is selected
    #[serde(default = "default_true")]
    pub capture_on_hide: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_store_path(),
            capture_on_hide: default_true(),
        }
    }
}

impl StorageConfig {
    /// Absolute state path for a workspace.
    pub fn resolve_state_path(&self, workspace_root: &Path) -> PathBuf {
        if self.state_path.is_absolute() {
            self.state_path.clone()
        } else {
            workspace_root.join(&self.state_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Security(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Security(msg) => write!(f, "Security: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SecurityConfig {
    pub fn validate(&self) -> Result<(), String> {
        for domain in &self.blocked_auth_domains {
            let trimmed = domain.trim();
            if trimmed.is_empty() {
                return Err("Blocked auth domain cannot be empty".to_string());
            }
            if trimmed.contains('/') || trimmed.contains(':') || trimmed.contains(' ') {
                return Err(format!(
                    "Blocked auth domain '{}' must be a bare host name",
                    domain
                ));
            }
        }
        Ok(())
    }
}

impl ShellConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.security.validate() {
            errors.push(ValidationError::Security(e));
        }

        if self.storage.state_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "State path cannot be empty".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all errors into one `ApiError`.
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
