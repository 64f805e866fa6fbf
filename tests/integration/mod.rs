//! Integration tests for the flowshell view control layer

pub use test_utils::*;

mod capture_restore;
mod cli_binary;
mod config_integration;
mod ipc_commands;
mod security_decisions;
