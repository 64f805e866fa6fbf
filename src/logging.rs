//! Logging System
//!
//! Structured logging using the `tracing` crate. Level, format and
//! destination come from [`LoggingConfig`] with `FLOWSHELL_LOG*`
//! environment overrides.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (if output is "file")
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".flowshell/flowshell.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stdout,
    Stderr,
    File,
}

impl std::str::FromStr for LogTarget {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogTarget::Stdout),
            "stderr" => Ok(LogTarget::Stderr),
            "file" => Ok(LogTarget::File),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', or 'file')",
                other
            ))),
        }
    }
}

/// Crates whose debug output drowns the controller's own events.
const QUIET_DEPENDENCIES: &[&str] = &["sled=warn"];

/// Install the global subscriber.
///
/// `FLOWSHELL_LOG`, `FLOWSHELL_LOG_FORMAT` and `FLOWSHELL_LOG_OUTPUT` win
/// over `config`, which wins over the defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = env_filter(config)?;
    let json = match std::env::var("FLOWSHELL_LOG_FORMAT") {
        Ok(format) if format == "json" || format == "text" => format == "json",
        _ => match config.format.as_str() {
            "json" => true,
            "text" => false,
            other => {
                return Err(ApiError::ConfigError(format!(
                    "Invalid log format: {} (must be 'json' or 'text')",
                    other
                )))
            }
        },
    };
    let target: LogTarget = match std::env::var("FLOWSHELL_LOG_OUTPUT") {
        Ok(output) => output.parse()?,
        Err(_) => config.output.parse()?,
    };
    let writer = make_writer(target, &config.file)?;

    let registry = Registry::default().with(filter);
    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color && target != LogTarget::File)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| ApiError::ConfigError(format!("Failed to install log subscriber: {}", e)))
}

fn make_writer(target: LogTarget, file: &Path) -> Result<BoxMakeWriter, ApiError> {
    Ok(match target {
        LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::File => {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ApiError::ConfigError(format!("Failed to create log directory: {}", e))
                })?;
            }
            let handle = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .map_err(|e| {
                    ApiError::ConfigError(format!("Failed to open log file {:?}: {}", file, e))
                })?;
            BoxMakeWriter::new(std::sync::Mutex::new(handle))
        }
    })
}

/// Level filter: `FLOWSHELL_LOG` verbatim, else the configured level with
/// quieted dependencies and per-module overrides.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env("FLOWSHELL_LOG") {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let overrides = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level));
    let mut filter = EnvFilter::new(&config.level);
    for directive in QUIET_DEPENDENCIES.iter().map(|d| d.to_string()).chain(overrides) {
        let parsed = directive
            .parse()
            .map_err(|e| ApiError::ConfigError(format!("Invalid log directive '{}': {}", directive, e)))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}
