//! State capture and restore.
//!
//! Capture snapshots a view's navigation context together with a
//! content-derived [`Anchor`]. Restore tries the anchor first and falls back
//! to replaying the raw history index, because content can change between
//! capture and restore.

pub mod anchor;

pub use anchor::Anchor;

use crate::content::ContentHost;
use crate::error::StorageError;
use crate::store::StateStore;
use crate::types::{now_millis, NavigationState, PageId, ViewKey};
use crate::view::View;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable snapshot of one view's navigation position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedState {
    pub key: ViewKey,
    /// Committed URL at capture time; reloaded before restoring.
    pub url: String,
    pub title: String,
    pub navigation: NavigationState,
    pub anchor: Option<Anchor>,
    /// Milliseconds since the Unix epoch.
    pub captured_at: u64,
    /// Number of captures taken for this key, this one included.
    pub revision: u64,
}

/// Which restore phase produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMethod {
    Anchor,
    Index,
    None,
}

impl fmt::Display for RestoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RestoreMethod::Anchor => "anchor",
            RestoreMethod::Index => "index",
            RestoreMethod::None => "none",
        };
        f.write_str(s)
    }
}

/// Outcome of a restore attempt. Emitted, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub page_id: PageId,
    pub method: RestoreMethod,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RestoreResult {
    fn succeeded(page_id: PageId, method: RestoreMethod) -> Self {
        Self {
            page_id,
            method,
            success: true,
            message: None,
        }
    }

    fn failed(page_id: PageId, message: String) -> Self {
        Self {
            page_id,
            method: RestoreMethod::None,
            success: false,
            message: Some(message),
        }
    }
}

/// Capture/restore engine over a state store and the content layer.
///
/// The engine knows nothing about the registry; callers hand it a view
/// snapshot and decide what to do with the outcome.
pub struct CaptureEngine {
    store: Arc<dyn StateStore>,
    content: Arc<dyn ContentHost>,
    /// Held across the revision read and the write.
    writes: Mutex<()>,
}

impl CaptureEngine {
    pub fn new(store: Arc<dyn StateStore>, content: Arc<dyn ContentHost>) -> Self {
        Self {
            store,
            content,
            writes: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Snapshot `view` and write it, superseding any prior record.
    pub fn capture(&self, view: &View) -> Result<CapturedState, StorageError> {
        let _writing = self.writes.lock();
        let previous_revision = self
            .store
            .get(&view.key)?
            .map(|s| s.revision)
            .unwrap_or(0);

        let anchor = self
            .content
            .anchor_marker(&view.key)
            .and_then(|marker| Anchor::derive(&marker));

        let state = CapturedState {
            key: view.key.clone(),
            url: view.url.clone(),
            title: view.title.clone(),
            navigation: view.navigation.clone(),
            anchor,
            captured_at: now_millis(),
            revision: previous_revision + 1,
        };
        self.store.put(&state)?;

        debug!(
            view = %state.key,
            revision = state.revision,
            anchored = state.anchor.is_some(),
            history_index = state.navigation.history_index,
            "Captured view state"
        );
        Ok(state)
    }

    /// Two-phase restore against the content currently loaded for `key`.
    pub async fn restore(&self, key: &ViewKey, state: &CapturedState) -> RestoreResult {
        let page_id = key.page_id.clone();

        let anchor_miss = match &state.anchor {
            Some(anchor) => {
                if self.content.seek_anchor(key, anchor).await {
                    info!(view = %key, anchor = %anchor, "Restored position from anchor");
                    return RestoreResult::succeeded(page_id, RestoreMethod::Anchor);
                }
                debug!(view = %key, anchor = %anchor, "Anchor not found, falling back to history index");
                format!("anchor {} was not found in the current content", anchor)
            }
            None => "no anchor was captured".to_string(),
        };

        if self.content.replay_history(key, &state.navigation).await {
            info!(
                view = %key,
                history_index = state.navigation.history_index,
                "Restored position from history index"
            );
            return RestoreResult::succeeded(page_id, RestoreMethod::Index);
        }

        let message = format!(
            "Could not restore position: {} and history index {} is no longer valid",
            anchor_miss, state.navigation.history_index
        );
        warn!(view = %key, %message, "Restore failed; view stays at its initial position");
        RestoreResult::failed(page_id, message)
    }
}
