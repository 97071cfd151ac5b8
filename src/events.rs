//! Typed event model and observer registry.
//!
//! Broker-driven notifications are modeled as a closed sum type with a shared
//! originating-client field; consumers pattern-match on [`EventKind`] rather
//! than downcasting. The registry fans events out synchronously, in
//! registration order, on whatever task invokes the dispatch.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Non-owning identification of the client an event originated from.
///
/// Used purely for attribution when several clients share one observer; it
/// carries no lifecycle control over the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(Arc<str>);

impl ClientId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A broker-driven notification attributed to its originating client.
#[derive(Debug, Clone)]
pub struct Event {
    pub client: ClientId,
    pub kind: EventKind,
}

/// The event variants a client can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The established connection dropped. The transport keeps reconnecting
    /// on its own; no counterpart success event is emitted.
    ConnectionLost { cause: String },
    /// A message arrived on a subscribed topic. The payload is the exact byte
    /// sequence received from the broker.
    MessageReceived { topic: String, payload: Bytes },
    /// A QoS >= 1 publish was acknowledged by the broker. Emitted only when
    /// delivery events are enabled in the configuration.
    MessageSent { message_id: u16 },
}

/// Identity handle returned by [`ObserverRegistry::register`], used to
/// deregister that exact observer later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Boxed event handler. Handlers run on the transport's callback task and
/// must not block it for long durations.
pub type Observer = Box<dyn Fn(&Event) + Send + Sync + 'static>;

/// Insertion-ordered observer set with ordered, synchronous fan-out.
///
/// There is no uniqueness constraint beyond identity: the same closure
/// registered twice is invoked twice.
#[derive(Default)]
pub struct ObserverRegistry {
    handlers: Vec<(HandlerId, Observer)>,
    next_id: u64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer and returns its identity handle.
    pub fn register(&mut self, observer: Observer) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, observer));
        id
    }

    /// Removes the observer with the given identity. Returns false when no
    /// such observer is registered.
    pub fn deregister(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Delivers the event to every observer in registration order.
    pub fn dispatch(&self, event: &Event) {
        for (_, observer) in &self.handlers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
