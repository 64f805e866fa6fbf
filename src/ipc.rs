//! Boundary commands.
//!
//! Messages from the presentation layer arrive as JSON objects tagged with
//! `"command"`. They are parsed into [`ViewCommand`], validated, and only
//! then dispatched to the controller.

use crate::capture::CapturedState;
use crate::controller::{NavigationOutcome, ShellController};
use crate::error::ViewError;
use crate::security::{DecisionId, InterstitialResponse, Resolution};
use crate::types::{Bounds, FlowId, NavigationState, PageId, ViewKey};
use crate::view::View;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Closed set of commands the boundary accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewCommand {
    Create {
        flow_id: FlowId,
        page_id: PageId,
        url: String,
        #[serde(default)]
        state: Option<CapturedState>,
    },
    Select {
        flow_id: FlowId,
        #[serde(default)]
        page_id: Option<PageId>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        state: Option<CapturedState>,
    },
    Resize {
        bounds: Bounds,
    },
    Remove {
        flow_id: FlowId,
        page_id: PageId,
    },
    /// Without `flow_id` the page id must be unique across flows.
    UpdateUrl {
        #[serde(default)]
        flow_id: Option<FlowId>,
        page_id: PageId,
        url: String,
    },
    UpdateTitle {
        #[serde(default)]
        flow_id: Option<FlowId>,
        page_id: PageId,
        title: String,
    },
    UpdateNavigation {
        flow_id: FlowId,
        page_id: PageId,
        /// Hex-encoded navigation blob.
        #[serde(default)]
        blob: String,
        history_index: usize,
    },
    HttpsUpgradeFailed {
        flow_id: FlowId,
        page_id: PageId,
        original_url: String,
        fallback_url: String,
        error: String,
    },
    CaptureState {
        flow_id: FlowId,
        page_id: PageId,
    },
    RestoreState {
        flow_id: FlowId,
        page_id: PageId,
        state: CapturedState,
    },
    /// `response` stays raw until dispatch so that anything outside the
    /// interstitial vocabulary is reported as a bypass attempt.
    Resolve {
        flow_id: FlowId,
        page_id: PageId,
        decision_id: DecisionId,
        response: serde_json::Value,
    },
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    Done,
    View { view: View },
    Captured { state: CapturedState },
    Navigation {
        committed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        decision_id: Option<DecisionId>,
    },
    Resolved { resolution: Option<Resolution> },
}

impl ViewCommand {
    /// Parse and validate one JSON message.
    pub fn from_json(input: &str) -> Result<Self, ViewError> {
        let command: ViewCommand = serde_json::from_str(input)
            .map_err(|e| ViewError::InvalidCommand(format!("malformed command: {}", e)))?;
        command.validate()?;
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewCommand::Create { .. } => "create",
            ViewCommand::Select { .. } => "select",
            ViewCommand::Resize { .. } => "resize",
            ViewCommand::Remove { .. } => "remove",
            ViewCommand::UpdateUrl { .. } => "update_url",
            ViewCommand::UpdateTitle { .. } => "update_title",
            ViewCommand::UpdateNavigation { .. } => "update_navigation",
            ViewCommand::HttpsUpgradeFailed { .. } => "https_upgrade_failed",
            ViewCommand::CaptureState { .. } => "capture_state",
            ViewCommand::RestoreState { .. } => "restore_state",
            ViewCommand::Resolve { .. } => "resolve",
        }
    }

    /// Reject empty ids, unparseable URLs and degenerate geometry.
    pub fn validate(&self) -> Result<(), ViewError> {
        match self {
            ViewCommand::Create {
                flow_id,
                page_id,
                url,
                ..
            } => {
                require_flow(flow_id)?;
                require_page(page_id)?;
                require_url("url", url)
            }
            ViewCommand::Select {
                flow_id,
                page_id,
                url,
                ..
            } => {
                require_flow(flow_id)?;
                if let Some(page_id) = page_id {
                    require_page(page_id)?;
                }
                if let Some(url) = url {
                    require_url("url", url)?;
                }
                Ok(())
            }
            ViewCommand::Resize { bounds } => {
                if bounds.width == 0 || bounds.height == 0 {
                    return Err(ViewError::InvalidCommand(format!(
                        "resize to {}x{} has no area",
                        bounds.width, bounds.height
                    )));
                }
                Ok(())
            }
            ViewCommand::UpdateUrl {
                flow_id,
                page_id,
                url,
            } => {
                if let Some(flow_id) = flow_id {
                    require_flow(flow_id)?;
                }
                require_page(page_id)?;
                require_url("url", url)
            }
            ViewCommand::UpdateTitle {
                flow_id, page_id, ..
            } => {
                if let Some(flow_id) = flow_id {
                    require_flow(flow_id)?;
                }
                require_page(page_id)
            }
            ViewCommand::UpdateNavigation {
                flow_id,
                page_id,
                blob,
                ..
            } => {
                require_flow(flow_id)?;
                require_page(page_id)?;
                hex::decode(blob).map(|_| ()).map_err(|e| {
                    ViewError::InvalidCommand(format!("blob is not valid hex: {}", e))
                })
            }
            ViewCommand::HttpsUpgradeFailed {
                flow_id,
                page_id,
                original_url,
                fallback_url,
                ..
            } => {
                require_flow(flow_id)?;
                require_page(page_id)?;
                require_url("original_url", original_url)?;
                require_url("fallback_url", fallback_url)
            }
            ViewCommand::Remove { flow_id, page_id }
            | ViewCommand::CaptureState { flow_id, page_id }
            | ViewCommand::RestoreState {
                flow_id, page_id, ..
            }
            | ViewCommand::Resolve {
                flow_id, page_id, ..
            } => {
                require_flow(flow_id)?;
                require_page(page_id)
            }
        }
    }
}

fn require_flow(flow_id: &FlowId) -> Result<(), ViewError> {
    if flow_id.as_str().trim().is_empty() {
        return Err(ViewError::InvalidCommand("flow_id cannot be empty".to_string()));
    }
    Ok(())
}

fn require_page(page_id: &PageId) -> Result<(), ViewError> {
    if page_id.as_str().trim().is_empty() {
        return Err(ViewError::InvalidCommand("page_id cannot be empty".to_string()));
    }
    Ok(())
}

fn require_url(field: &str, url: &str) -> Result<(), ViewError> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| ViewError::InvalidCommand(format!("{} '{}' is not a valid URL: {}", field, url, e)))
}

/// Parse an interstitial response. Anything outside the closed vocabulary
/// is a bypass attempt, not a malformed command.
pub fn parse_response(key: &ViewKey, raw: &serde_json::Value) -> Result<InterstitialResponse, ViewError> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        warn!(view = %key, response = %raw, "Unrecognized interstitial response");
        ViewError::SecurityBypassAttempt {
            key: key.clone(),
            reason: format!("unrecognized interstitial response: {}", e),
        }
    })
}

/// Validate `command` and run it against `controller`.
pub async fn dispatch(controller: &ShellController, command: ViewCommand) -> Result<CommandReply, ViewError> {
    command.validate()?;
    debug!(command = command.name(), "Dispatching command");

    match command {
        ViewCommand::Create {
            flow_id,
            page_id,
            url,
            state,
        } => {
            let view = controller
                .create(ViewKey::new(flow_id, page_id), &url, state)
                .await?;
            Ok(CommandReply::View { view })
        }
        ViewCommand::Select {
            flow_id,
            page_id,
            url,
            state,
        } => {
            controller
                .select(&flow_id, page_id.as_ref(), url.as_deref(), state)
                .await?;
            Ok(CommandReply::Done)
        }
        ViewCommand::Resize { bounds } => {
            controller.resize(bounds).await?;
            Ok(CommandReply::Done)
        }
        ViewCommand::Remove { flow_id, page_id } => {
            controller.remove(&ViewKey::new(flow_id, page_id)).await?;
            Ok(CommandReply::Done)
        }
        ViewCommand::UpdateUrl {
            flow_id,
            page_id,
            url,
        } => {
            let key = controller.resolve_key(flow_id.as_ref(), &page_id)?;
            let outcome = controller.update_url(&key, &url).await?;
            Ok(navigation_reply(outcome))
        }
        ViewCommand::UpdateTitle {
            flow_id,
            page_id,
            title,
        } => {
            let key = controller.resolve_key(flow_id.as_ref(), &page_id)?;
            controller.update_title(&key, &title).await?;
            Ok(CommandReply::Done)
        }
        ViewCommand::UpdateNavigation {
            flow_id,
            page_id,
            blob,
            history_index,
        } => {
            let blob = hex::decode(&blob)
                .map_err(|e| ViewError::InvalidCommand(format!("blob is not valid hex: {}", e)))?;
            controller.update_navigation(
                &ViewKey::new(flow_id, page_id),
                NavigationState::new(blob, history_index),
            )?;
            Ok(CommandReply::Done)
        }
        ViewCommand::HttpsUpgradeFailed {
            flow_id,
            page_id,
            original_url,
            fallback_url,
            error,
        } => {
            let handle = controller
                .report_https_upgrade_failure(
                    &ViewKey::new(flow_id, page_id),
                    &original_url,
                    &fallback_url,
                    &error,
                )
                .await?;
            Ok(CommandReply::Navigation {
                committed: false,
                decision_id: handle.map(|h| h.id()),
            })
        }
        ViewCommand::CaptureState { flow_id, page_id } => {
            let state = controller.capture_state(&ViewKey::new(flow_id, page_id))?;
            Ok(CommandReply::Captured { state })
        }
        ViewCommand::RestoreState {
            flow_id,
            page_id,
            state,
        } => {
            controller
                .restore_state(&ViewKey::new(flow_id, page_id), &state)
                .await?;
            Ok(CommandReply::Done)
        }
        ViewCommand::Resolve {
            flow_id,
            page_id,
            decision_id,
            response,
        } => {
            let key = ViewKey::new(flow_id, page_id);
            let response = parse_response(&key, &response)?;
            let resolution = controller
                .resolve_decision(&key, decision_id, &response)
                .await?;
            Ok(CommandReply::Resolved { resolution })
        }
    }
}

fn navigation_reply(outcome: NavigationOutcome) -> CommandReply {
    match outcome {
        NavigationOutcome::Committed => CommandReply::Navigation {
            committed: true,
            decision_id: None,
        },
        NavigationOutcome::Held { pending } => CommandReply::Navigation {
            committed: false,
            decision_id: Some(pending),
        },
        NavigationOutcome::Intercepted(handle) => CommandReply::Navigation {
            committed: false,
            decision_id: Some(handle.id()),
        },
    }
}
