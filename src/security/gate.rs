//! Pending decisions and their completion handles.

use crate::error::ViewError;
use crate::security::{
    Classification, DecisionId, InterstitialResponse, Resolution, SecurityDecision,
    SecurityState,
};
use crate::types::ViewKey;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How a decision handle completed. Each handle completes exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Resolved(Resolution),
    /// A newer interception on the same view replaced this one.
    Superseded,
    /// The view was removed before a decision arrived.
    Cancelled,
}

/// Future that completes when the interception it was issued for ends.
#[derive(Debug)]
pub struct DecisionHandle {
    id: DecisionId,
    key: ViewKey,
    receiver: oneshot::Receiver<DecisionOutcome>,
}

impl DecisionHandle {
    pub fn id(&self) -> DecisionId {
        self.id
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    /// Non-blocking check. `None` while still pending.
    pub fn try_outcome(&mut self) -> Option<DecisionOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(DecisionOutcome::Cancelled),
        }
    }
}

impl Future for DecisionHandle {
    type Output = DecisionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(DecisionOutcome::Cancelled))
    }
}

#[derive(Debug)]
struct PendingDecision {
    decision: SecurityDecision,
    completion_tx: oneshot::Sender<DecisionOutcome>,
}

impl PendingDecision {
    fn complete(self, outcome: DecisionOutcome) {
        // The waiter may have dropped its handle; that is fine.
        let _ = self.completion_tx.send(outcome);
    }
}

/// At most one pending decision per view; a newer interception replaces
/// the older one.
#[derive(Debug, Default)]
pub struct DecisionGate {
    pending: HashMap<ViewKey, PendingDecision>,
    next_id: u64,
}

impl DecisionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an interception for `key`, superseding any pending one.
    pub fn intercept(
        &mut self,
        key: &ViewKey,
        classification: Classification,
        url: String,
        original_url: Option<String>,
        error_detail: Option<String>,
    ) -> (SecurityDecision, DecisionHandle) {
        self.next_id += 1;
        let id = DecisionId::new(self.next_id);
        let decision = SecurityDecision {
            id,
            classification,
            url,
            original_url,
            error_detail,
            resolution: Resolution::Pending,
        };
        let (completion_tx, receiver) = oneshot::channel();

        let replaced = self.pending.insert(
            key.clone(),
            PendingDecision {
                decision: decision.clone(),
                completion_tx,
            },
        );
        if let Some(previous) = replaced {
            debug!(
                view = %key,
                superseded = %previous.decision.id,
                by = %id,
                "Interception superseded"
            );
            previous.complete(DecisionOutcome::Superseded);
        }

        let handle = DecisionHandle {
            id,
            key: key.clone(),
            receiver,
        };
        (decision, handle)
    }

    pub fn state(&self, key: &ViewKey) -> SecurityState {
        match self.pending.get(key) {
            Some(p) => SecurityState::Intercepted(p.decision.clone()),
            None => SecurityState::Idle,
        }
    }

    pub fn is_intercepted(&self, key: &ViewKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check `response` against the interception `id` on `key` without
    /// ending it. The returned decision carries the resolution the response
    /// would produce.
    ///
    /// Returns `Ok(None)` when there is nothing to resolve (stale id,
    /// superseded decision, removed view). A response outside the
    /// classification's vocabulary, or naming a URL the decision never
    /// offered, is a bypass attempt.
    pub fn check(
        &self,
        key: &ViewKey,
        id: DecisionId,
        response: &InterstitialResponse,
    ) -> Result<Option<SecurityDecision>, ViewError> {
        let Some(pending) = self.pending.get(key) else {
            debug!(view = %key, decision = %id, "No pending decision; resolution ignored");
            return Ok(None);
        };
        if pending.decision.id != id {
            debug!(
                view = %key,
                decision = %id,
                current = %pending.decision.id,
                "Stale decision id; resolution ignored"
            );
            return Ok(None);
        }

        match admit(&pending.decision, response) {
            Ok(resolution) => {
                let mut decision = pending.decision.clone();
                decision.resolution = resolution;
                Ok(Some(decision))
            }
            Err(reason) => {
                warn!(view = %key, decision = %id, %reason, "Rejected security bypass attempt");
                Err(ViewError::SecurityBypassAttempt {
                    key: key.clone(),
                    reason,
                })
            }
        }
    }

    /// End the interception `id` on `key` with `response`. Same outcomes as
    /// [`DecisionGate::check`]; a rejected response leaves the decision
    /// pending.
    pub fn resolve(
        &mut self,
        key: &ViewKey,
        id: DecisionId,
        response: &InterstitialResponse,
    ) -> Result<Option<SecurityDecision>, ViewError> {
        let Some(decision) = self.check(key, id, response)? else {
            return Ok(None);
        };
        let Some(pending) = self.pending.remove(key) else {
            return Ok(None);
        };
        pending.complete(DecisionOutcome::Resolved(decision.resolution));
        Ok(Some(decision))
    }

    /// Drop the pending decision for a removed view.
    pub fn cancel(&mut self, key: &ViewKey) -> bool {
        match self.pending.remove(key) {
            Some(pending) => {
                debug!(view = %key, decision = %pending.decision.id, "Interception cancelled");
                pending.complete(DecisionOutcome::Cancelled);
                true
            }
            None => false,
        }
    }
}

/// Map a response onto a resolution the decision allows.
fn admit(decision: &SecurityDecision, response: &InterstitialResponse) -> Result<Resolution, String> {
    match (decision.classification, response) {
        (_, InterstitialResponse::GoBack) => Ok(Resolution::GoBack),
        (Classification::HttpsDowngrade, InterstitialResponse::AllowInsecure { url }) => {
            let offered = decision.original_url.as_deref() == Some(url.as_str())
                || decision.url == *url;
            if offered {
                Ok(Resolution::ProceedInsecure)
            } else {
                Err(format!("allow_insecure names {} which this decision never offered", url))
            }
        }
        (Classification::BlockedAuthDomain, InterstitialResponse::OpenExternal { url }) => {
            if decision.url == *url {
                Ok(Resolution::OpenExternal)
            } else {
                Err(format!("open_external names {} instead of {}", url, decision.url))
            }
        }
        (classification, InterstitialResponse::AllowInsecure { .. }) => Err(format!(
            "allow_insecure is not a valid decision for {}",
            classification
        )),
        (classification, InterstitialResponse::OpenExternal { .. }) => Err(format!(
            "open_external is not a valid decision for {}",
            classification
        )),
    }
}
