//! CLI parse: clap types for flowshell. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flowshell CLI - inspect and drive the view control layer
#[derive(Parser, Debug)]
#[command(name = "flowshell")]
#[command(about = "Control layer for a multi-pane browsing shell")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List captured view states
    States {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Only states of this flow
        #[arg(long)]
        flow: Option<String>,
    },
    /// Show one captured state as JSON
    Show {
        /// Flow id
        flow: String,
        /// Page id
        page: String,
    },
    /// Classify a URL against the security policy
    Check {
        /// URL to classify
        url: String,
    },
    /// Replay a JSON-lines command script against an in-memory content host
    Run {
        /// Script file, one command object per line
        script: PathBuf,
        /// JSON file mapping URLs to page content ({"blocks": [...], "history_len": n})
        #[arg(long)]
        pages: Option<PathBuf>,
        /// Prompt for interstitial decisions as they appear
        #[arg(long)]
        interactive: bool,
        /// Write captures to the workspace state store instead of memory
        #[arg(long)]
        persist: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}
