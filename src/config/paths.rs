//! Platform paths for configuration and state.

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "flowshell")
}

/// Directory holding the global config file.
pub fn default_config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default captured-state database location.
///
/// Falls back to a workspace-relative path when no home directory exists.
pub fn default_store_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("state"))
        .unwrap_or_else(|| PathBuf::from(".flowshell/state"))
}
