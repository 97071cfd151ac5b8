//! Serializable view of the live connection state.

use serde::Serialize;

/// Read-only diagnostic view of the connection identity, derived options and
/// transport statistics.
///
/// The serialized key names are a stable contract for consumers parsing the
/// output; `server-uris` is present only when candidate URIs were configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    /// Transport client identifier (generated per transport instance).
    pub id: String,
    pub current_server_uri: String,
    /// Packet identifiers of publishes not yet acknowledged by the broker.
    pub pending_delivery_tokens: Vec<u16>,
    pub server_uri: String,
    /// Acknowledgment wait budget in milliseconds.
    pub time_to_wait: u64,
    pub username: Option<String>,
    /// Connect handshake timeout in seconds.
    pub connection_timeout: u64,
    pub keepalive_interval: u64,
    pub max_inflight: u16,
    pub max_reconnect_delay: u64,
    pub mqtt_version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_uris: Option<Vec<String>>,
}
