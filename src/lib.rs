//! Flowshell: control layer for a multi-pane browsing shell
//!
//! Manages independently navigable content panes ("views") grouped into
//! flows, keeps their navigation position durable across restarts, and
//! gates unsafe navigations behind explicit user decisions.

pub mod capture;
pub mod cli;
pub mod config;
pub mod content;
pub mod controller;
pub mod error;
pub mod external;
pub mod injector;
pub mod ipc;
pub mod logging;
pub mod relay;
pub mod security;
pub mod store;
pub mod types;
pub mod view;

pub use controller::{ControllerBuilder, NavigationOutcome, ShellController};
