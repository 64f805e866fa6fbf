//! Notification relay: typed events out of the core, subscription handles in.

pub mod bus;
pub mod events;

pub use bus::{NotificationRelay, Subscription};
pub use events::{EventEnvelope, InterstitialKind, ShellEvent};
