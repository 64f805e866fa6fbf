//! Out-of-process default-browser opener.

use crate::error::ContentError;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Hands a URL to something outside the shell.
pub trait ExternalOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), ContentError>;
}

/// Opens URLs with the platform's default browser launcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl ExternalOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), ContentError> {
        debug!(url, "Opening URL in default browser");
        // Spawn and detach; the launcher's exit status is not our concern.
        Self::command(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| {
                warn!(url, error = %e, "Default browser launcher failed");
                ContentError::ExternalOpenFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })
    }
}
