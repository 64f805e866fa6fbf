//! Content layer contract.
//!
//! The shell never renders. Everything it needs from the renderer goes
//! through [`ContentHost`]: loading, layout, anchor lookup, history replay
//! and teardown.

pub mod memory;

pub use memory::MemoryContent;

use crate::capture::Anchor;
use crate::error::ContentError;
use crate::types::{Bounds, NavigationState, ViewKey};
use async_trait::async_trait;

#[async_trait]
pub trait ContentHost: Send + Sync {
    /// Load `url` into the pane for `key`, creating the pane if needed.
    async fn load(&self, key: &ViewKey, url: &str) -> Result<(), ContentError>;

    /// Apply geometry and visibility to the pane.
    fn apply_layout(&self, key: &ViewKey, bounds: Bounds, visible: bool);

    /// Text of the content block at the pane's current position, used to
    /// derive an [`Anchor`]. `None` when nothing stable is on screen.
    fn anchor_marker(&self, key: &ViewKey) -> Option<String>;

    /// Locate `anchor` in the loaded content and reposition onto it.
    async fn seek_anchor(&self, key: &ViewKey, anchor: &Anchor) -> bool;

    /// Replay the raw history position. `false` when the index no longer
    /// exists in the pane's session history.
    async fn replay_history(&self, key: &ViewKey, navigation: &NavigationState) -> bool;

    /// Tear the pane down.
    fn destroy(&self, key: &ViewKey);
}
