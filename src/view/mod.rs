//! Views: one navigable content pane per `(flow, page)`.

pub mod registry;

pub use registry::ViewRegistry;

use crate::types::{Bounds, FlowId, NavigationState, PageId, ViewKey};
use serde::{Deserialize, Serialize};

/// URL a pane shows before its first committed navigation.
pub const BLANK_URL: &str = "about:blank";

/// One navigable pane. Owned by the [`ViewRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub key: ViewKey,
    /// Last committed URL.
    pub url: String,
    pub title: String,
    pub bounds: Bounds,
    pub visible: bool,
    pub navigation: NavigationState,
    #[serde(skip)]
    pub(crate) epoch: u64,
}

impl View {
    pub(crate) fn new(key: ViewKey, epoch: u64) -> Self {
        Self {
            key,
            url: BLANK_URL.to_string(),
            title: String::new(),
            bounds: Bounds::default(),
            visible: false,
            navigation: NavigationState::default(),
            epoch,
        }
    }

    pub fn flow_id(&self) -> &FlowId {
        &self.key.flow_id
    }

    pub fn page_id(&self) -> &PageId {
        &self.key.page_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
