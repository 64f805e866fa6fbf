//! In-process fan-out of shell events to subscribers.

use crate::relay::events::{EventEnvelope, ShellEvent};
use futures::Stream;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

#[derive(Default)]
struct RelayInner {
    subscribers: BTreeMap<u64, UnboundedSender<EventEnvelope>>,
    next_subscriber: u64,
    next_seq: u64,
}

/// Cloneable handle to the relay. All clones share subscribers.
#[derive(Clone, Default)]
pub struct NotificationRelay {
    inner: Arc<Mutex<RelayInner>>,
}

impl NotificationRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Dropping the returned handle unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = unbounded_channel();
        let mut inner = self.inner.lock();
        inner.next_subscriber += 1;
        let id = inner.next_subscriber;
        inner.subscribers.insert(id, sender);
        Subscription {
            id,
            receiver,
            relay: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber. Returns how many got it.
    ///
    /// Sequence numbers are assigned under the subscriber lock, so every
    /// subscriber observes events in emission order.
    pub fn emit(&self, event: ShellEvent) -> usize {
        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        let envelope = EventEnvelope::with_now(inner.next_seq, event);
        trace!(seq = envelope.seq, event_type = envelope.event.event_type(), "Relaying event");

        inner
            .subscribers
            .retain(|_, sender| sender.send(envelope.clone()).is_ok());
        inner.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Live subscription. Events queue until received; dropping frees it.
pub struct Subscription {
    id: u64,
    receiver: UnboundedReceiver<EventEnvelope>,
    relay: Weak<Mutex<RelayInner>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now, in order.
    pub fn drain(&mut self) -> Vec<ShellEvent> {
        let mut events = Vec::new();
        while let Some(envelope) = self.try_recv() {
            events.push(envelope.event);
        }
        events
    }
}

impl Stream for Subscription {
    type Item = EventEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(relay) = self.relay.upgrade() {
            relay.lock().subscribers.remove(&self.id);
        }
    }
}
