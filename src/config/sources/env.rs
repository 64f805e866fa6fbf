//! Environment source: FLOWSHELL_SECTION__KEY=value

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Add `FLOWSHELL_*` overrides. Nested keys use `__`, e.g.
/// `FLOWSHELL_SECURITY__INTERCEPT_HTTPS_DOWNGRADE=false`. The domain
/// denylist accepts a comma separated list.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("FLOWSHELL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("security.blocked_auth_domains"),
    )
}
