//! Identity-masking injector contract.
//!
//! The payload itself belongs to the embedder. The shell only guarantees the
//! injector runs once per view, before the view's first load.

use crate::types::ViewKey;

/// Fire-and-forget pre-navigation script installer.
pub trait IdentityInjector: Send + Sync {
    fn inject(&self, key: &ViewKey);
}

/// Injector that does nothing. Used when the embedder has no payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInjector;

impl IdentityInjector for NoopInjector {
    fn inject(&self, _key: &ViewKey) {}
}
