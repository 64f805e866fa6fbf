//! Config loader: assembles sources in precedence order and validates.

use crate::config::merge::merge_policy::builder_with_defaults;
use crate::config::sources::{env, global_file, workspace_file};
use crate::config::ShellConfig;
use crate::error::ApiError;
use config::File;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global config file,
    /// `config/config.toml`, `config/{FLOWSHELL_ENV}.toml`, `FLOWSHELL_*`
    /// environment variables.
    pub fn load(workspace_root: &Path) -> Result<ShellConfig, ApiError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = env::add_to_builder(builder);

        let config: ShellConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded shell configuration");
        config.validated()
    }

    /// Load configuration from one explicit file (plus environment).
    pub fn load_from_file(path: &Path) -> Result<ShellConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = env::add_to_builder(builder);

        let config: ShellConfig = builder.build()?.try_deserialize()?;
        debug!(config_path = %path.display(), "Loaded shell configuration from file");
        config.validated()
    }

    /// Defaults only; no files or environment.
    pub fn default() -> ShellConfig {
        ShellConfig::default()
    }
}
