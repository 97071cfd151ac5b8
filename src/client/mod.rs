//! Managed broker client: facade, connection options, and event routing.

mod client;
mod connection;
mod dispatch;

pub use client::MqttClient;
pub use connection::{qos_from_level, ConnectionState, ReconnectConfig};
pub use dispatch::{route_event, CallbackRoute};
