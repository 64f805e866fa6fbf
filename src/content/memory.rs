//! In-memory content host.
//!
//! Models pages as ordered text blocks plus a session-history length. Backs
//! the CLI `run` command and the test suite.

use crate::capture::Anchor;
use crate::content::ContentHost;
use crate::error::ContentError;
use crate::external::ExternalOpener;
use crate::injector::IdentityInjector;
use crate::types::{Bounds, NavigationState, ViewKey};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Page content: text blocks in document order and how deep the session
/// history behind the page is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageContent {
    pub blocks: Vec<String>,
    #[serde(default)]
    pub history_len: usize,
}

impl PageContent {
    pub fn new<I, S>(blocks: I, history_len: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocks: blocks.into_iter().map(Into::into).collect(),
            history_len,
        }
    }
}

#[derive(Debug, Clone)]
struct Pane {
    url: String,
    position: usize,
    history_index: usize,
    bounds: Bounds,
    visible: bool,
}

/// Collaborator calls in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOp {
    Inject(ViewKey),
    Load(ViewKey, String),
    Destroy(ViewKey),
    OpenExternal(String),
}

#[derive(Default)]
pub struct MemoryContent {
    pages: RwLock<HashMap<String, PageContent>>,
    panes: RwLock<HashMap<ViewKey, Pane>>,
    failing_urls: RwLock<HashSet<String>>,
    ops: Mutex<Vec<ContentOp>>,
    restores_held: AtomicBool,
    restore_release: Notify,
}

impl MemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) the content served for `url`.
    pub fn set_page(&self, url: impl Into<String>, page: PageContent) {
        self.pages.write().insert(url.into(), page);
    }

    /// Make loads of `url` fail.
    pub fn fail_loads_of(&self, url: impl Into<String>) {
        self.failing_urls.write().insert(url.into());
    }

    /// Move the pane to the block at `position`.
    pub fn scroll_to(&self, key: &ViewKey, position: usize) {
        if let Some(pane) = self.panes.write().get_mut(key) {
            pane.position = position;
        }
    }

    pub fn position(&self, key: &ViewKey) -> Option<usize> {
        self.panes.read().get(key).map(|p| p.position)
    }

    pub fn history_index(&self, key: &ViewKey) -> Option<usize> {
        self.panes.read().get(key).map(|p| p.history_index)
    }

    pub fn pane_url(&self, key: &ViewKey) -> Option<String> {
        self.panes.read().get(key).map(|p| p.url.clone())
    }

    pub fn layout(&self, key: &ViewKey) -> Option<(Bounds, bool)> {
        self.panes.read().get(key).map(|p| (p.bounds, p.visible))
    }

    pub fn has_pane(&self, key: &ViewKey) -> bool {
        self.panes.read().contains_key(key)
    }

    pub fn ops(&self) -> Vec<ContentOp> {
        self.ops.lock().clone()
    }

    pub fn opened_externally(&self) -> Vec<String> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                ContentOp::OpenExternal(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Park every anchor seek and history replay until
    /// [`MemoryContent::release_restores`] is called.
    pub fn hold_restores(&self) {
        self.restores_held.store(true, Ordering::SeqCst);
    }

    pub fn release_restores(&self) {
        self.restores_held.store(false, Ordering::SeqCst);
        self.restore_release.notify_waiters();
    }

    async fn wait_for_release(&self) {
        loop {
            let released = self.restore_release.notified();
            if !self.restores_held.load(Ordering::SeqCst) {
                return;
            }
            released.await;
        }
    }

    fn page_for(&self, key: &ViewKey) -> Option<PageContent> {
        let url = self.panes.read().get(key)?.url.clone();
        self.pages.read().get(&url).cloned()
    }
}

#[async_trait]
impl ContentHost for MemoryContent {
    async fn load(&self, key: &ViewKey, url: &str) -> Result<(), ContentError> {
        self.ops.lock().push(ContentOp::Load(key.clone(), url.to_string()));
        if self.failing_urls.read().contains(url) {
            return Err(ContentError::LoadFailed {
                url: url.to_string(),
                reason: "simulated network failure".to_string(),
            });
        }
        let mut panes = self.panes.write();
        let pane = panes.entry(key.clone()).or_insert_with(|| Pane {
            url: String::new(),
            position: 0,
            history_index: 0,
            bounds: Bounds::default(),
            visible: false,
        });
        pane.url = url.to_string();
        pane.position = 0;
        Ok(())
    }

    fn apply_layout(&self, key: &ViewKey, bounds: Bounds, visible: bool) {
        if let Some(pane) = self.panes.write().get_mut(key) {
            pane.bounds = bounds;
            pane.visible = visible;
        }
    }

    fn anchor_marker(&self, key: &ViewKey) -> Option<String> {
        let position = self.position(key)?;
        self.page_for(key)?.blocks.get(position).cloned()
    }

    async fn seek_anchor(&self, key: &ViewKey, anchor: &Anchor) -> bool {
        self.wait_for_release().await;
        let Some(page) = self.page_for(key) else {
            return false;
        };
        let found = page
            .blocks
            .iter()
            .position(|block| Anchor::derive(block).as_ref() == Some(anchor));
        match found {
            Some(position) => {
                self.scroll_to(key, position);
                true
            }
            None => false,
        }
    }

    async fn replay_history(&self, key: &ViewKey, navigation: &NavigationState) -> bool {
        self.wait_for_release().await;
        let Some(page) = self.page_for(key) else {
            return false;
        };
        if navigation.history_index >= page.history_len {
            return false;
        }
        if let Some(pane) = self.panes.write().get_mut(key) {
            pane.history_index = navigation.history_index;
            true
        } else {
            false
        }
    }

    fn destroy(&self, key: &ViewKey) {
        self.ops.lock().push(ContentOp::Destroy(key.clone()));
        self.panes.write().remove(key);
    }
}

impl IdentityInjector for MemoryContent {
    fn inject(&self, key: &ViewKey) {
        self.ops.lock().push(ContentOp::Inject(key.clone()));
    }
}

impl ExternalOpener for MemoryContent {
    fn open(&self, url: &str) -> Result<(), ContentError> {
        self.ops.lock().push(ContentOp::OpenExternal(url.to_string()));
        Ok(())
    }
}
