//! # mqbus
//!
//! Managed MQTT client for event-driven services: one facade owning the
//! connection lifecycle, topic pub/sub at a configured default QoS, an
//! observer registry for broker-driven events, and an introspectable
//! connection snapshot.
//!
//! The transport reconnects on its own after a drop; observers are told about
//! the loss (`ConnectionLost`) and recovery shows up only as operations
//! working again.
//!
//! ## Quick start
//!
//! ```no_run
//! use mqbus::{ClientConfig, EventKind, MqttClient};
//!
//! # async fn run() -> Result<(), mqbus::ClientError> {
//! let config = ClientConfig::new("tcp://broker.local:1883")
//!     .name("sensor-gateway")
//!     .qos(1);
//!
//! let mut client = MqttClient::new(config)?;
//! client.connect().await?;
//!
//! client.add_observer(|event| {
//!     if let EventKind::MessageReceived { topic, payload } = &event.kind {
//!         println!("{}: {} bytes", topic, payload.len());
//!     }
//! });
//!
//! client.subscribe("sensors/#").await?;
//! client.publish("sensors/hello", b"online".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod snapshot;

pub use client::{ConnectionState, MqttClient, ReconnectConfig};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use events::{ClientId, Event, EventKind, HandlerId, Observer, ObserverRegistry};
pub use snapshot::Snapshot;
