//! Global config file source: $XDG_CONFIG_HOME/flowshell/config.toml

use crate::config::paths::default_config_dir;
use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::PathBuf;
use tracing::debug;

/// Path to global config file.
pub fn global_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join("config.toml"))
}

/// Add global config file source to builder if it exists.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if let Some(config_path) = global_config_path() {
        if config_path.exists() {
            let canonical = config_path
                .canonicalize()
                .unwrap_or_else(|_| config_path.clone());
            builder = builder.add_source(File::from(canonical).required(false));
        } else {
            debug!(
                config_path = %config_path.display(),
                "No global configuration file; using defaults"
            );
        }
    }
    Ok(builder)
}
