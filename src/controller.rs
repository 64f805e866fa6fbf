//! Shell controller
//!
//! Single owner of the view registry, the decision gate and the relay.
//! Every operation the embedder or the IPC boundary can perform goes through
//! [`ShellController`].
//!
//! Locking: the registry and the gate sit behind `parking_lot` mutexes that
//! are only held for synchronous sections. Mutations of one view key are
//! serialized by a per-key async mutex ([`locks::KeyLocks`]). Operations
//! that touch several views (showing one and hiding another, hiding a flow)
//! take every affected key's lock in sorted order. Restores drop the lock
//! while the content host works, and check the view's epoch afterwards so a
//! view removed mid-restore produces no event.

mod locks;

use crate::capture::{CaptureEngine, CapturedState, RestoreResult};
use crate::config::ShellConfig;
use crate::content::{ContentHost, MemoryContent};
use crate::error::{StorageError, ViewError};
use crate::external::ExternalOpener;
use crate::injector::{IdentityInjector, NoopInjector};
use crate::relay::{NotificationRelay, ShellEvent, Subscription};
use crate::security::{
    Classification, DecisionGate, DecisionHandle, DecisionId, InterstitialResponse, Resolution,
    SecurityPolicy, SecurityState,
};
use crate::store::{MemoryStateStore, StateStore};
use crate::types::{Bounds, FlowId, NavigationState, PageId, ViewKey};
use crate::view::{View, ViewRegistry, BLANK_URL};
use locks::KeyLocks;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What happened to a navigation offered to the security gate.
#[derive(Debug)]
pub enum NavigationOutcome {
    /// The URL is now the view's committed URL.
    Committed,
    /// A decision is already pending on the view; the URL was not committed.
    Held { pending: DecisionId },
    /// The navigation opened a new interception.
    Intercepted(DecisionHandle),
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, NavigationOutcome::Committed)
    }
}

/// Builder for [`ShellController`]. Unset collaborators fall back to
/// in-process implementations.
#[derive(Default)]
pub struct ControllerBuilder {
    content: Option<Arc<dyn ContentHost>>,
    injector: Option<Arc<dyn IdentityInjector>>,
    opener: Option<Arc<dyn ExternalOpener>>,
    store: Option<Arc<dyn StateStore>>,
    policy: Option<SecurityPolicy>,
    relay: Option<NotificationRelay>,
    capture_on_hide: Option<bool>,
}

impl ControllerBuilder {
    pub fn content(mut self, content: Arc<dyn ContentHost>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn injector(mut self, injector: Arc<dyn IdentityInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn opener(mut self, opener: Arc<dyn ExternalOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn relay(mut self, relay: NotificationRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn capture_on_hide(mut self, enabled: bool) -> Self {
        self.capture_on_hide = Some(enabled);
        self
    }

    /// Take policy and storage switches from a loaded configuration.
    pub fn with_config(mut self, config: &ShellConfig) -> Self {
        self.policy = Some(SecurityPolicy::from_config(&config.security));
        self.capture_on_hide = Some(config.storage.capture_on_hide);
        self
    }

    pub fn build(self) -> ShellController {
        // One in-memory host backs every unset collaborator so that loads,
        // injections and external opens land in the same op log.
        let memory = Arc::new(MemoryContent::new());
        let content = self
            .content
            .unwrap_or_else(|| memory.clone() as Arc<dyn ContentHost>);
        let injector = self
            .injector
            .unwrap_or_else(|| Arc::new(NoopInjector) as Arc<dyn IdentityInjector>);
        let opener = self
            .opener
            .unwrap_or_else(|| memory as Arc<dyn ExternalOpener>);
        let store: Arc<dyn StateStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStateStore::new()));

        ShellController {
            registry: Mutex::new(ViewRegistry::new()),
            gate: Mutex::new(DecisionGate::new()),
            locks: KeyLocks::default(),
            policy: self.policy.unwrap_or_default(),
            engine: CaptureEngine::new(store, Arc::clone(&content)),
            content,
            injector,
            opener,
            relay: self.relay.unwrap_or_default(),
            capture_on_hide: self.capture_on_hide.unwrap_or(true),
        }
    }
}

/// Control layer of the shell. Share it behind an `Arc`.
pub struct ShellController {
    registry: Mutex<ViewRegistry>,
    gate: Mutex<DecisionGate>,
    locks: KeyLocks,
    policy: SecurityPolicy,
    engine: CaptureEngine,
    content: Arc<dyn ContentHost>,
    injector: Arc<dyn IdentityInjector>,
    opener: Arc<dyn ExternalOpener>,
    relay: NotificationRelay,
    capture_on_hide: bool,
}

impl ShellController {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    // ---------------------------------------------------------------------
    // View lifecycle
    // ---------------------------------------------------------------------

    /// Allocate a view, inject the identity mask and load `url`.
    ///
    /// A blocked authentication domain is intercepted instead of loaded and
    /// the view stays at `about:blank`. When `initial_state` is given the
    /// restore runs after the load.
    #[instrument(skip(self, initial_state), fields(view = %key))]
    pub async fn create(
        &self,
        key: ViewKey,
        url: &str,
        initial_state: Option<CapturedState>,
    ) -> Result<View, ViewError> {
        let guard = self.locks.acquire(&key).await;

        let epoch = self.registry.lock().insert(key.clone())?.epoch;
        self.injector.inject(&key);

        let navigated = match self.policy.blocked_domain_for(url) {
            Some(domain) => {
                info!(view = %key, %url, %domain, "Initial navigation targets a blocked auth domain");
                if let Err(e) = self.content.load(&key, BLANK_URL).await {
                    self.discard(&key);
                    return Err(e.into());
                }
                self.open_interception(&key, Classification::BlockedAuthDomain, url, None, None);
                false
            }
            None => {
                if let Err(e) = self.content.load(&key, url).await {
                    warn!(view = %key, %url, error = %e, "Initial load failed; discarding view");
                    self.discard(&key);
                    return Err(e.into());
                }
                self.commit_url(&key, url);
                true
            }
        };
        let url = self.registry.lock().get_or_error(&key)?.url.clone();
        drop(guard);
        info!(view = %key, %url, "View created");

        if let Some(state) = initial_state {
            if navigated {
                self.run_restore(&key, epoch, &state).await;
            } else {
                debug!(view = %key, "Initial navigation held; skipping restore");
            }
        }

        // A remove that raced the initial restore wins.
        self.view(&key).ok_or(ViewError::NoSuchView(key))
    }

    /// Recreate a view from its persisted state.
    pub async fn reopen(&self, key: ViewKey) -> Result<View, ViewError> {
        let state = self
            .engine
            .store()
            .get(&key)?
            .ok_or_else(|| StorageError::StateNotFound(key.clone()))?;
        let url = state.url.clone();
        self.create(key, &url, Some(state)).await
    }

    /// Show a view, or hide a whole flow when `page_id` is `None`.
    #[instrument(skip(self, state), fields(flow = %flow_id))]
    pub async fn select(
        &self,
        flow_id: &FlowId,
        page_id: Option<&PageId>,
        url: Option<&str>,
        state: Option<CapturedState>,
    ) -> Result<(), ViewError> {
        let Some(page_id) = page_id else {
            self.hide_flow(flow_id).await;
            return Ok(());
        };
        let key = ViewKey::new(flow_id.clone(), page_id.clone());

        let guard = self.locks.acquire(&key).await;
        let epoch = self.registry.lock().get_or_error(&key)?.epoch;
        let navigated = match url {
            Some(url) => self.navigate_locked(&key, url).await?.is_committed(),
            None => true,
        };
        drop(guard);

        if let Some(state) = state {
            if navigated {
                self.run_restore(&key, epoch, &state).await;
            }
        }

        // The view being hidden is locked too; retry if the active view
        // changed while we waited for its lock.
        loop {
            let expected = self.active();
            let mut keys = vec![key.clone()];
            keys.extend(expected.clone());
            let _guards = self.locks.acquire_all(&keys).await;

            let (previous, bounds) = {
                let mut registry = self.registry.lock();
                if !registry.is_current(&key, epoch) {
                    debug!(view = %key, "View removed before it could be shown");
                    return Ok(());
                }
                if registry.active() != expected.as_ref() {
                    continue;
                }
                let previous = registry.activate(&key)?;
                let previous = previous.and_then(|prev| registry.get(&prev).cloned());
                let bounds = registry.get(&key).map(|v| v.bounds).unwrap_or_default();
                (previous, bounds)
            };

            if let Some(previous) = previous {
                self.content.apply_layout(&previous.key, previous.bounds, false);
                self.capture_hidden(&previous);
            }
            self.content.apply_layout(&key, bounds, true);
            debug!(view = %key, "View selected");
            return Ok(());
        }
    }

    async fn hide_flow(&self, flow_id: &FlowId) {
        let hidden: Vec<View> = loop {
            let keys = self.flow_keys(flow_id);
            let _guards = self.locks.acquire_all(&keys).await;
            let mut registry = self.registry.lock();
            let mut current: Vec<ViewKey> = registry
                .views_in_flow(flow_id)
                .into_iter()
                .map(|v| v.key.clone())
                .collect();
            current.sort();
            if current != keys {
                continue;
            }
            let hidden: Vec<View> = registry
                .hide_flow(flow_id)
                .iter()
                .filter_map(|key| registry.get(key).cloned())
                .collect();
            drop(registry);
            for view in &hidden {
                self.content.apply_layout(&view.key, view.bounds, false);
                self.capture_hidden(view);
            }
            break hidden;
        };
        debug!(flow = %flow_id, hidden = hidden.len(), "Flow hidden");
    }

    fn flow_keys(&self, flow_id: &FlowId) -> Vec<ViewKey> {
        let mut keys: Vec<ViewKey> = self
            .registry
            .lock()
            .views_in_flow(flow_id)
            .into_iter()
            .map(|v| v.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Apply `bounds` to the active view. No-op without one.
    pub async fn resize(&self, bounds: Bounds) -> Result<(), ViewError> {
        loop {
            let Some(key) = self.active() else {
                debug!("Resize without an active view");
                return Ok(());
            };
            let _guard = self.locks.acquire(&key).await;
            {
                let mut registry = self.registry.lock();
                if registry.active() != Some(&key) {
                    continue;
                }
                registry.resize_active(bounds);
            }
            self.content.apply_layout(&key, bounds, true);
            return Ok(());
        }
    }

    /// Capture, cancel pending work, destroy the pane and drop the view.
    #[instrument(skip(self), fields(view = %key))]
    pub async fn remove(&self, key: &ViewKey) -> Result<(), ViewError> {
        let _guard = self.locks.acquire(key).await;
        let Some(view) = self.view(key) else {
            warn!(view = %key, "Remove of unknown view ignored");
            return Ok(());
        };

        if let Err(e) = self.engine.capture(&view) {
            warn!(view = %key, error = %e, "Final capture failed; removing anyway");
        }
        self.gate.lock().cancel(key);
        self.content.destroy(key);
        self.registry.lock().remove(key);
        info!(view = %key, "View removed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Content layer reports
    // ---------------------------------------------------------------------

    /// The content layer navigated `key` to `url`.
    ///
    /// The URL is committed only when the gate lets it through.
    pub async fn update_url(&self, key: &ViewKey, url: &str) -> Result<NavigationOutcome, ViewError> {
        let _guard = self.locks.acquire(key).await;
        self.registry.lock().get_or_error(key)?;
        if let Some(outcome) = self.gate_navigation(key, url) {
            return Ok(outcome);
        }
        self.commit_url(key, url);
        Ok(NavigationOutcome::Committed)
    }

    pub async fn update_title(&self, key: &ViewKey, title: &str) -> Result<(), ViewError> {
        let _guard = self.locks.acquire(key).await;
        self.registry.lock().get_mut_or_error(key)?.title = title.to_string();
        self.relay.emit(ShellEvent::TitleUpdated {
            flow_id: key.flow_id.clone(),
            page_id: key.page_id.clone(),
            title: title.to_string(),
        });
        Ok(())
    }

    /// Record the pane's current navigation blob and history index.
    pub fn update_navigation(&self, key: &ViewKey, navigation: NavigationState) -> Result<(), ViewError> {
        self.registry.lock().get_mut_or_error(key)?.navigation = navigation;
        Ok(())
    }

    /// An automatic HTTPS upgrade of `original_url` failed.
    ///
    /// Opens an `HttpsDowngrade` interception. With downgrade interception
    /// disabled the navigation is abandoned and `None` is returned; the view
    /// never falls back to plain HTTP on its own.
    pub async fn report_https_upgrade_failure(
        &self,
        key: &ViewKey,
        original_url: &str,
        fallback_url: &str,
        error: &str,
    ) -> Result<Option<DecisionHandle>, ViewError> {
        let _guard = self.locks.acquire(key).await;
        self.registry.lock().get_or_error(key)?;
        if !self.policy.intercepts_https_downgrade() {
            info!(view = %key, %original_url, %error, "HTTPS upgrade failed; navigation abandoned");
            return Ok(None);
        }
        Ok(Some(self.open_interception(
            key,
            Classification::HttpsDowngrade,
            fallback_url,
            Some(original_url.to_string()),
            Some(error.to_string()),
        )))
    }

    // ---------------------------------------------------------------------
    // Capture / restore
    // ---------------------------------------------------------------------

    pub fn capture_state(&self, key: &ViewKey) -> Result<CapturedState, ViewError> {
        let view = self.registry.lock().get_or_error(key)?.clone();
        Ok(self.engine.capture(&view)?)
    }

    /// Restore `state` into the view. The outcome is emitted as a
    /// `RestoreResult` event; only a missing view is an error.
    pub async fn restore_state(&self, key: &ViewKey, state: &CapturedState) -> Result<(), ViewError> {
        let epoch = self.registry.lock().get_or_error(key)?.epoch;
        self.run_restore(key, epoch, state).await;
        Ok(())
    }

    /// Restore the persisted record for `key`, reloading its URL first when
    /// the view has moved on. `Ok(false)` when there is no record or the
    /// reload was intercepted.
    pub async fn restore_from_store(&self, key: &ViewKey) -> Result<bool, ViewError> {
        let Some(state) = self.engine.store().get(key)? else {
            debug!(view = %key, "No stored state to restore");
            return Ok(false);
        };

        let guard = self.locks.acquire(key).await;
        let (epoch, url) = {
            let registry = self.registry.lock();
            let view = registry.get_or_error(key)?;
            (view.epoch, view.url.clone())
        };
        if url != state.url && !self.navigate_locked(key, &state.url).await?.is_committed() {
            return Ok(false);
        }
        drop(guard);

        self.run_restore(key, epoch, &state).await;
        Ok(true)
    }

    pub fn stored_state(&self, key: &ViewKey) -> Result<Option<CapturedState>, ViewError> {
        Ok(self.engine.store().get(key)?)
    }

    pub fn stored_states(&self) -> Result<Vec<CapturedState>, ViewError> {
        Ok(self.engine.store().list_all()?)
    }

    async fn run_restore(&self, key: &ViewKey, epoch: u64, state: &CapturedState) -> Option<RestoreResult> {
        let result = self.engine.restore(key, state).await;

        // Check and emit under the registry lock so a concurrent remove
        // cannot slip in between.
        let registry = self.registry.lock();
        if !registry.is_current(key, epoch) {
            debug!(view = %key, method = %result.method, "View removed during restore; result dropped");
            return None;
        }
        self.relay.emit(ShellEvent::RestoreResult {
            flow_id: key.flow_id.clone(),
            page_id: result.page_id.clone(),
            method: result.method,
            success: result.success,
            message: result.message.clone(),
        });
        Some(result)
    }

    fn capture_hidden(&self, view: &View) {
        if !self.capture_on_hide {
            return;
        }
        if let Err(e) = self.engine.capture(view) {
            warn!(view = %view.key, error = %e, "Capture on hide failed");
        }
    }

    // ---------------------------------------------------------------------
    // Security decisions
    // ---------------------------------------------------------------------

    /// Apply the user's answer to interception `id`.
    ///
    /// The decision only ends once its side effect (insecure load or
    /// external open) succeeded. Returns the resolution, or `None` when the
    /// decision was already superseded, resolved or cancelled.
    #[instrument(skip(self, response), fields(view = %key, decision = %id))]
    pub async fn resolve_decision(
        &self,
        key: &ViewKey,
        id: DecisionId,
        response: &InterstitialResponse,
    ) -> Result<Option<Resolution>, ViewError> {
        let _guard = self.locks.acquire(key).await;
        if !self.registry.lock().contains(key) {
            debug!(view = %key, "Resolution for removed view ignored");
            return Ok(None);
        }
        let checked = self.gate.lock().check(key, id, response);
        let Some(decision) = checked? else {
            return Ok(None);
        };

        // Side effects run first; if they fail the decision stays pending
        // and the user can answer again.
        let target = decision
            .original_url
            .clone()
            .unwrap_or_else(|| decision.url.clone());
        match decision.resolution {
            Resolution::ProceedInsecure => {
                if let Err(e) = self.content.load(key, &target).await {
                    warn!(view = %key, url = %target, error = %e, "Insecure proceed failed; decision still pending");
                    return Err(e.into());
                }
            }
            Resolution::OpenExternal => {
                if let Err(e) = self.opener.open(&decision.url) {
                    warn!(view = %key, url = %decision.url, error = %e, "External open failed; decision still pending");
                    return Err(e.into());
                }
            }
            Resolution::GoBack | Resolution::Pending => {}
        }

        let resolved = self.gate.lock().resolve(key, id, response);
        let Some(decision) = resolved? else {
            return Ok(None);
        };
        info!(
            view = %key,
            decision = %decision.id,
            classification = %decision.classification,
            resolution = %decision.resolution,
            "Security decision resolved"
        );
        self.relay.emit(ShellEvent::DecisionResolved {
            decision_id: decision.id,
            flow_id: key.flow_id.clone(),
            page_id: key.page_id.clone(),
            resolution: decision.resolution,
        });
        if decision.resolution == Resolution::ProceedInsecure {
            self.commit_url(key, &target);
        }
        Ok(Some(decision.resolution))
    }

    pub fn security_state(&self, key: &ViewKey) -> SecurityState {
        self.gate.lock().state(key)
    }

    /// Classify a navigation the shell is about to make or the content layer
    /// just reported. `None` means it may proceed.
    fn gate_navigation(&self, key: &ViewKey, url: &str) -> Option<NavigationOutcome> {
        if let SecurityState::Intercepted(pending) = self.gate.lock().state(key) {
            debug!(view = %key, %url, pending = %pending.id, "Navigation held behind pending decision");
            return Some(NavigationOutcome::Held { pending: pending.id });
        }
        if self.policy.is_blocked_auth_domain(url) {
            let handle =
                self.open_interception(key, Classification::BlockedAuthDomain, url, None, None);
            return Some(NavigationOutcome::Intercepted(handle));
        }
        None
    }

    /// Shell-initiated navigation. Caller holds the key lock.
    async fn navigate_locked(&self, key: &ViewKey, url: &str) -> Result<NavigationOutcome, ViewError> {
        if let Some(outcome) = self.gate_navigation(key, url) {
            return Ok(outcome);
        }
        self.content.load(key, url).await?;
        self.commit_url(key, url);
        Ok(NavigationOutcome::Committed)
    }

    fn open_interception(
        &self,
        key: &ViewKey,
        classification: Classification,
        url: &str,
        original_url: Option<String>,
        error_detail: Option<String>,
    ) -> DecisionHandle {
        let (decision, handle) = self.gate.lock().intercept(
            key,
            classification,
            url.to_string(),
            original_url,
            error_detail,
        );
        info!(view = %key, decision = %decision.id, %classification, %url, "Navigation intercepted");
        self.relay.emit(ShellEvent::Interstitial {
            decision_id: decision.id,
            flow_id: key.flow_id.clone(),
            page_id: key.page_id.clone(),
            kind: classification,
            url: decision.url,
            original_url: decision.original_url,
            error: decision.error_detail,
        });
        handle
    }

    fn commit_url(&self, key: &ViewKey, url: &str) {
        let mut registry = self.registry.lock();
        let Some(view) = registry.get_mut(key) else {
            return;
        };
        view.url = url.to_string();
        self.relay.emit(ShellEvent::UrlUpdated {
            flow_id: key.flow_id.clone(),
            page_id: key.page_id.clone(),
            url: url.to_string(),
        });
    }

    /// Undo a half-finished create.
    fn discard(&self, key: &ViewKey) {
        self.gate.lock().cancel(key);
        self.content.destroy(key);
        self.registry.lock().remove(key);
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn subscribe(&self) -> Subscription {
        self.relay.subscribe()
    }

    pub fn relay(&self) -> &NotificationRelay {
        &self.relay
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn view(&self, key: &ViewKey) -> Option<View> {
        self.registry.lock().get(key).cloned()
    }

    pub fn views_in_flow(&self, flow_id: &FlowId) -> Vec<View> {
        self.registry
            .lock()
            .views_in_flow(flow_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn views(&self) -> Vec<View> {
        self.registry.lock().list_all().into_iter().cloned().collect()
    }

    pub fn active(&self) -> Option<ViewKey> {
        self.registry.lock().active().cloned()
    }

    /// Resolve a page id to its key, using `flow_id` when given.
    pub fn resolve_key(&self, flow_id: Option<&FlowId>, page_id: &PageId) -> Result<ViewKey, ViewError> {
        match flow_id {
            Some(flow_id) => Ok(ViewKey::new(flow_id.clone(), page_id.clone())),
            None => self.registry.lock().find_by_page(page_id),
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// View keys with a live per-key lock entry. Zero when the controller
    /// is idle.
    pub fn locked_keys(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// Flush the state store.
    pub fn flush(&self) -> Result<(), ViewError> {
        Ok(self.engine.store().flush()?)
    }
}
