//! Callback adapter: translates transport events into typed client events.
//!
//! Routing is a pure function over the transport's event type; the adapter
//! applies the delivery-event gating and pending-token bookkeeping, then fans
//! the resulting event out through the observer registry. Everything runs on
//! the supervisor task, i.e. the transport's callback context.

use crate::events::{ClientId, Event, EventKind, ObserverRegistry};
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::Event as TransportEvent;
use rumqttc::Outgoing;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Routing decision for one transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackRoute {
    /// Broker acknowledged the connect handshake.
    ConnectionAcknowledged,
    /// Broker refused the connect handshake.
    ConnectionRefused { reason: String },
    /// A message arrived on a subscribed topic.
    MessageArrived { topic: String, payload: Bytes },
    /// A QoS >= 1 publish completed its acknowledgment flow
    /// (PubAck for QoS 1, PubComp for QoS 2).
    DeliveryComplete { message_id: u16 },
    /// An outgoing publish was handed to the wire; its packet id becomes a
    /// pending delivery token until acknowledged.
    PublishQueued { message_id: u16 },
    /// Broker closed the connection.
    BrokerDisconnect { reason: String },
    /// Protocol bookkeeping with no client-visible effect.
    Uninteresting,
}

/// Maps a transport event to its routing decision (pure function).
pub fn route_event(event: &TransportEvent) -> CallbackRoute {
    match event {
        TransportEvent::Incoming(packet) => match packet {
            Packet::ConnAck(ack) => match ack.code {
                ConnectReturnCode::Success => CallbackRoute::ConnectionAcknowledged,
                code => CallbackRoute::ConnectionRefused {
                    reason: format!("broker refused connection: {code:?}"),
                },
            },
            Packet::Publish(publish) => CallbackRoute::MessageArrived {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.clone(),
            },
            Packet::PubAck(ack) => CallbackRoute::DeliveryComplete {
                message_id: ack.pkid,
            },
            Packet::PubComp(comp) => CallbackRoute::DeliveryComplete {
                message_id: comp.pkid,
            },
            Packet::Disconnect(disconnect) => CallbackRoute::BrokerDisconnect {
                reason: format!("broker disconnect: {:?}", disconnect.reason_code),
            },
            _ => CallbackRoute::Uninteresting,
        },
        TransportEvent::Outgoing(Outgoing::Publish(pkid)) => CallbackRoute::PublishQueued {
            message_id: *pkid,
        },
        TransportEvent::Outgoing(_) => CallbackRoute::Uninteresting,
    }
}

/// Translates routed callbacks into typed events and dispatches them.
pub struct CallbackAdapter {
    client: ClientId,
    notify_delivery: bool,
    pending: Mutex<BTreeSet<u16>>,
    observers: Arc<Mutex<ObserverRegistry>>,
}

impl CallbackAdapter {
    pub fn new(
        client: ClientId,
        notify_delivery: bool,
        observers: Arc<Mutex<ObserverRegistry>>,
    ) -> Self {
        Self {
            client,
            notify_delivery,
            pending: Mutex::new(BTreeSet::new()),
            observers,
        }
    }

    fn observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, BTreeSet<u16>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: EventKind) {
        let event = Event {
            client: self.client.clone(),
            kind,
        };
        self.observers().dispatch(&event);
    }

    /// Handles a routed message or delivery callback. Connection-state routes
    /// are the supervisor's concern and are ignored here.
    pub fn handle(&self, route: CallbackRoute) {
        match route {
            CallbackRoute::MessageArrived { topic, payload } => {
                self.emit(EventKind::MessageReceived { topic, payload });
            }
            CallbackRoute::DeliveryComplete { message_id } => {
                self.pending().remove(&message_id);
                if self.notify_delivery {
                    self.emit(EventKind::MessageSent { message_id });
                } else {
                    debug!(client = %self.client, message_id, "delivery acknowledged");
                }
            }
            CallbackRoute::PublishQueued { message_id } => {
                // Packet id 0 marks an at-most-once publish, never acknowledged.
                if message_id != 0 {
                    self.pending().insert(message_id);
                }
            }
            _ => {}
        }
    }

    /// Emits `ConnectionLost` unconditionally; failure visibility does not
    /// depend on the delivery-event flag.
    pub fn connection_lost(&self, cause: impl Into<String>) {
        self.emit(EventKind::ConnectionLost {
            cause: cause.into(),
        });
    }

    /// Unacknowledged delivery tokens, in packet-id order.
    pub fn pending_tokens(&self) -> Vec<u16> {
        self.pending().iter().copied().collect()
    }
}
