//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Only scalar defaults live here; list defaults come from the serde
/// defaults on [`crate::config::SecurityConfig`] so a file that sets the
/// list replaces it instead of merging element-wise.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("security.intercept_https_downgrade", true)?
        .set_default("storage.capture_on_hide", true)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}
