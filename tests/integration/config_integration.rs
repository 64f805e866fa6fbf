//! Integration tests for layered configuration loading

use flowshell::config::{default_config_dir, ConfigLoader};
use flowshell::error::ApiError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::integration::with_isolated_env;

fn write_workspace_file(workspace: &Path, name: &str, contents: &str) {
    let dir = workspace.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_defaults_without_any_source() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.security.blocked_auth_domains, vec!["accounts.google.com"]);
        assert!(config.security.intercept_https_downgrade);
        assert!(config.storage.capture_on_hide);
        assert!(config
            .storage
            .state_path
            .starts_with(test_dir.path().join("data")));
        assert_eq!(config.logging.format, "text");
    });
}

#[test]
fn test_global_file_is_read_from_config_home() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let dir = default_config_dir().unwrap();
        assert!(dir.starts_with(test_dir.path().join("config")));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            "[security]\nblocked_auth_domains = [\"login.global.test\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.security.blocked_auth_domains, vec!["login.global.test"]);
    });
}

#[test]
fn test_workspace_files_override_global_in_order() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let dir = default_config_dir().unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            "[storage]\ncapture_on_hide = false\n[security]\nintercept_https_downgrade = false\n",
        )
        .unwrap();
        write_workspace_file(
            workspace.path(),
            "config.toml",
            "[security]\nintercept_https_downgrade = true\n",
        );
        write_workspace_file(
            workspace.path(),
            "development.toml",
            "[storage]\nstate_path = \"dev-state\"\n",
        );

        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert!(config.security.intercept_https_downgrade);
        assert!(!config.storage.capture_on_hide);
        assert_eq!(
            config.storage.resolve_state_path(workspace.path()),
            workspace.path().join("dev-state")
        );
    });
}

#[test]
fn test_environment_file_follows_flowshell_env() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        write_workspace_file(
            workspace.path(),
            "development.toml",
            "[logging]\nlevel = \"debug\"\n",
        );
        write_workspace_file(
            workspace.path(),
            "production.toml",
            "[logging]\nlevel = \"warn\"\nformat = \"json\"\n",
        );

        std::env::set_var("FLOWSHELL_ENV", "production");
        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "json");
    });
}

#[test]
fn test_environment_variables_take_precedence() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        write_workspace_file(
            workspace.path(),
            "config.toml",
            "[security]\nblocked_auth_domains = [\"login.workspace.test\"]\n",
        );
        std::env::set_var(
            "FLOWSHELL_SECURITY__BLOCKED_AUTH_DOMAINS",
            "login.a.test,login.b.test",
        );
        std::env::set_var("FLOWSHELL_STORAGE__CAPTURE_ON_HIDE", "false");

        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(
            config.security.blocked_auth_domains,
            vec!["login.a.test", "login.b.test"]
        );
        assert!(!config.storage.capture_on_hide);
    });
}

#[test]
fn test_invalid_values_are_rejected() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        write_workspace_file(
            workspace.path(),
            "config.toml",
            "[security]\nblocked_auth_domains = [\"https://accounts.google.com/\"]\n[logging]\nformat = \"yaml\"\n",
        );

        let err = ConfigLoader::load(workspace.path()).unwrap_err();
        let ApiError::ConfigError(message) = err else {
            panic!("expected a configuration error, got {:?}", err);
        };
        assert!(message.contains("must be a bare host name"));
        assert!(message.contains("Invalid log format: yaml"));
    });
}

#[test]
fn test_explicit_file_skips_workspace_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        write_workspace_file(
            workspace.path(),
            "config.toml",
            "[storage]\ncapture_on_hide = false\n",
        );
        let explicit = workspace.path().join("explicit.toml");
        fs::write(&explicit, "[security]\nblocked_auth_domains = [\"sso.explicit.test\"]\n").unwrap();

        let config = ConfigLoader::load_from_file(&explicit).unwrap();
        assert_eq!(config.security.blocked_auth_domains, vec!["sso.explicit.test"]);
        assert!(config.storage.capture_on_hide);

        let missing = ConfigLoader::load_from_file(&workspace.path().join("nope.toml"));
        assert!(matches!(missing, Err(ApiError::ConfigError(_))));
    });
}
