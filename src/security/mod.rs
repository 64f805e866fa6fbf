//! Security decision state machine.
//!
//! Per view: `Idle -> Intercepted -> Resolved -> Idle`. An interception
//! holds the view at its last committed URL until an explicit decision
//! arrives. There is no timeout.

pub mod gate;
pub mod policy;

pub use gate::{DecisionGate, DecisionHandle, DecisionOutcome};
pub use policy::SecurityPolicy;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one interception. Monotonic per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(u64);

impl DecisionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a navigation was intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Automatic HTTPS upgrade failed; continuing means going insecure.
    HttpsDowngrade,
    /// Target is an identity provider that rejects embedded browsers.
    BlockedAuthDomain,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::HttpsDowngrade => f.write_str("https_downgrade"),
            Classification::BlockedAuthDomain => f.write_str("blocked_auth_domain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Pending,
    GoBack,
    ProceedInsecure,
    OpenExternal,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Pending => "pending",
            Resolution::GoBack => "go_back",
            Resolution::ProceedInsecure => "proceed_insecure",
            Resolution::OpenExternal => "open_external",
        };
        f.write_str(s)
    }
}

/// An outstanding navigation interception. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDecision {
    pub id: DecisionId,
    pub classification: Classification,
    /// Target the view was trying to reach.
    pub url: String,
    /// Pre-upgrade form of the target (HTTPS downgrades only).
    pub original_url: Option<String>,
    pub error_detail: Option<String>,
    pub resolution: Resolution,
}

/// The only vocabulary that can end an interception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InterstitialResponse {
    GoBack,
    AllowInsecure { url: String },
    OpenExternal { url: String },
}

/// Per-view security state as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityState {
    Idle,
    Intercepted(SecurityDecision),
}

impl SecurityState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SecurityState::Idle)
    }
}
