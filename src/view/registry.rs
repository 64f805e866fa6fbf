//! View registry: in-memory aggregate of live views.

use crate::error::ViewError;
use crate::types::{next_epoch, Bounds, FlowId, PageId, ViewKey};
use crate::view::View;
use std::collections::BTreeMap;

/// Registry of live views keyed by `(flow, page)`.
///
/// Holds at most one view per key and at most one active view overall. The
/// registry is plain data; the controller serializes access to it.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: BTreeMap<ViewKey, View>,
    active: Option<ViewKey>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new view. Fails without touching the existing view when
    /// the key is taken.
    pub fn insert(&mut self, key: ViewKey) -> Result<&mut View, ViewError> {
        if self.views.contains_key(&key) {
            return Err(ViewError::DuplicateView(key));
        }
        let view = View::new(key.clone(), next_epoch());
        Ok(self.views.entry(key).or_insert(view))
    }

    pub fn get(&self, key: &ViewKey) -> Option<&View> {
        self.views.get(key)
    }

    pub fn get_mut(&mut self, key: &ViewKey) -> Option<&mut View> {
        self.views.get_mut(key)
    }

    /// Get a view or return `NoSuchView`.
    pub fn get_or_error(&self, key: &ViewKey) -> Result<&View, ViewError> {
        self.get(key)
            .ok_or_else(|| ViewError::NoSuchView(key.clone()))
    }

    pub fn get_mut_or_error(&mut self, key: &ViewKey) -> Result<&mut View, ViewError> {
        self.views
            .get_mut(key)
            .ok_or_else(|| ViewError::NoSuchView(key.clone()))
    }

    pub fn contains(&self, key: &ViewKey) -> bool {
        self.views.contains_key(key)
    }

    /// True while the view created with `epoch` is still registered.
    pub fn is_current(&self, key: &ViewKey, epoch: u64) -> bool {
        self.views.get(key).is_some_and(|v| v.epoch == epoch)
    }

    /// Remove a view, clearing the active marker if it pointed at it.
    pub fn remove(&mut self, key: &ViewKey) -> Option<View> {
        let removed = self.views.remove(key);
        if removed.is_some() && self.active.as_ref() == Some(key) {
            self.active = None;
        }
        removed
    }

    pub fn active(&self) -> Option<&ViewKey> {
        self.active.as_ref()
    }

    /// Make `key` the single active, visible view.
    ///
    /// Returns the previously active key when it differs and was hidden.
    pub fn activate(&mut self, key: &ViewKey) -> Result<Option<ViewKey>, ViewError> {
        if !self.views.contains_key(key) {
            return Err(ViewError::NoSuchView(key.clone()));
        }
        let previous = match self.active.take() {
            Some(prev) if prev != *key => {
                if let Some(view) = self.views.get_mut(&prev) {
                    view.visible = false;
                }
                Some(prev)
            }
            _ => None,
        };
        if let Some(view) = self.views.get_mut(key) {
            view.visible = true;
        }
        self.active = Some(key.clone());
        Ok(previous)
    }

    /// Hide every view of a flow. Returns the keys that were visible.
    pub fn hide_flow(&mut self, flow_id: &FlowId) -> Vec<ViewKey> {
        let mut hidden = Vec::new();
        for view in self.views.values_mut() {
            if view.key.flow_id == *flow_id && view.visible {
                view.visible = false;
                hidden.push(view.key.clone());
            }
        }
        if self.active.as_ref().is_some_and(|k| k.flow_id == *flow_id) {
            self.active = None;
        }
        hidden
    }

    /// Apply bounds to the active view. Returns the key resized, if any.
    pub fn resize_active(&mut self, bounds: Bounds) -> Option<ViewKey> {
        let key = self.active.clone()?;
        let view = self.views.get_mut(&key)?;
        view.bounds = bounds;
        Some(key)
    }

    pub fn views_in_flow(&self, flow_id: &FlowId) -> Vec<&View> {
        self.views
            .values()
            .filter(|v| v.key.flow_id == *flow_id)
            .collect()
    }

    /// Resolve a bare page id to its key. Page ids are only unique within a
    /// flow, so a page present in two flows is ambiguous.
    pub fn find_by_page(&self, page_id: &PageId) -> Result<ViewKey, ViewError> {
        let mut matches = self.views.keys().filter(|k| k.page_id == *page_id);
        let first = matches
            .next()
            .cloned()
            .ok_or_else(|| ViewError::NoSuchPage(page_id.clone()))?;
        if matches.next().is_some() {
            return Err(ViewError::AmbiguousPage(page_id.clone()));
        }
        Ok(first)
    }

    pub fn list_all(&self) -> Vec<&View> {
        self.views.values().collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
