//! Event schema for the notification relay.

use crate::capture::RestoreMethod;
use crate::security::{Classification, DecisionId, Resolution};
use crate::types::{FlowId, PageId};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Which interstitial the presentation layer should show.
pub type InterstitialKind = Classification;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShellEvent {
    UrlUpdated {
        flow_id: FlowId,
        page_id: PageId,
        url: String,
    },
    TitleUpdated {
        flow_id: FlowId,
        page_id: PageId,
        title: String,
    },
    RestoreResult {
        flow_id: FlowId,
        page_id: PageId,
        method: RestoreMethod,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Interstitial {
        decision_id: DecisionId,
        flow_id: FlowId,
        page_id: PageId,
        kind: InterstitialKind,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        original_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    DecisionResolved {
        decision_id: DecisionId,
        flow_id: FlowId,
        page_id: PageId,
        resolution: Resolution,
    },
}

impl ShellEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ShellEvent::UrlUpdated { .. } => "url_updated",
            ShellEvent::TitleUpdated { .. } => "title_updated",
            ShellEvent::RestoreResult { .. } => "restore_result",
            ShellEvent::Interstitial { .. } => "interstitial",
            ShellEvent::DecisionResolved { .. } => "decision_resolved",
        }
    }

    pub fn page_id(&self) -> &PageId {
        match self {
            ShellEvent::UrlUpdated { page_id, .. }
            | ShellEvent::TitleUpdated { page_id, .. }
            | ShellEvent::RestoreResult { page_id, .. }
            | ShellEvent::Interstitial { page_id, .. }
            | ShellEvent::DecisionResolved { page_id, .. } => page_id,
        }
    }

    pub fn flow_id(&self) -> &FlowId {
        match self {
            ShellEvent::UrlUpdated { flow_id, .. }
            | ShellEvent::TitleUpdated { flow_id, .. }
            | ShellEvent::RestoreResult { flow_id, .. }
            | ShellEvent::Interstitial { flow_id, .. }
            | ShellEvent::DecisionResolved { flow_id, .. } => flow_id,
        }
    }
}

/// Event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub ts: String,
    pub seq: u64,
    pub event: ShellEvent,
}

impl EventEnvelope {
    pub fn with_now(seq: u64, event: ShellEvent) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            seq,
            event,
        }
    }
}
