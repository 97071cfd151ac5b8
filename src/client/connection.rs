//! Pure connection-state types and transport option derivation.

use crate::config::{ClientConfig, ConfigError};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Keep-alive interval sent to the broker.
pub const KEEP_ALIVE_SECS: u64 = 60;
/// How long `connect()` waits for the broker's acknowledgment.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Upper bound on unacknowledged in-flight publishes.
pub const MAX_INFLIGHT: u16 = 10;
/// Acknowledgment wait budget reported by the snapshot.
pub const TIME_TO_WAIT_MS: u64 = 30_000;
/// Protocol version negotiated by the transport.
pub const MQTT_VERSION: u8 = 5;

/// Connection lifecycle state, observed through a watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Waiting for the broker's connect acknowledgment.
    Connecting,
    /// Connected and ready for operations.
    Connected,
    /// Connection dropped, with the failure description.
    Disconnected(String),
    /// Transport is retrying after a drop (attempt count).
    Reconnecting(u32),
}

/// Backoff policy applied between reconnection attempts.
///
/// Retries are unlimited: reconnection after a drop belongs to the transport
/// layer and is never surfaced as a success event, only as eventually
/// working operations again.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delays in milliseconds for the first attempts.
    pub backoff_pattern: Vec<u64>,
    /// Delay used once the pattern is exhausted.
    pub sustained_delay: u64,
    /// How long `connect()` waits for the broker's acknowledgment.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![250, 500, 1000, 2000],
            sustained_delay: 2000,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given 1-based attempt.
    pub fn backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }
}

/// Introspectable summary of the derived connect options, feeding the
/// snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsSummary {
    pub client_id: String,
    pub server_uri: String,
    pub username: Option<String>,
    pub connection_timeout_secs: u64,
    pub keepalive_secs: u64,
    pub max_inflight: u16,
    pub max_reconnect_delay_ms: u64,
    pub mqtt_version: u8,
    pub time_to_wait_ms: u64,
    pub server_uris: Option<Vec<String>>,
}

/// Credentials to attach to the connect options: the pair, or nothing.
/// Validation rejects half-set credentials, so a lone username or password
/// never reaches the wire.
pub fn credential_pair(config: &ClientConfig) -> Option<(&str, &str)> {
    match (&config.username, &config.password) {
        (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
        _ => None,
    }
}

/// Maps a configured QoS level to the transport's QoS type.
pub fn qos_from_level(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

/// Derives transport connect options from a validated configuration.
///
/// A fresh transport client identifier is generated per transport instance.
/// Session state lives in memory; `clean_start` is disabled so subscription
/// state survives reconnects, and credentials are attached only when both
/// username and password are present.
pub fn derive_mqtt_options(
    config: &ClientConfig,
    reconnect: &ReconnectConfig,
) -> Result<(MqttOptions, OptionsSummary), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|_| ConfigError::InvalidEndpoint(config.endpoint.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidEndpoint(config.endpoint.clone()))?;
    let tls = matches!(url.scheme(), "ssl" | "mqtts");
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    let client_id = Uuid::new_v4().to_string();
    let mut options = MqttOptions::new(client_id.clone(), host, port);

    if tls {
        options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    options.set_clean_start(false);
    options.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));

    if let Some((username, password)) = credential_pair(config) {
        options.set_credentials(username, password);
    }

    let summary = OptionsSummary {
        client_id,
        server_uri: config.endpoint.clone(),
        username: config.username.clone(),
        connection_timeout_secs: reconnect.connect_timeout.as_secs(),
        keepalive_secs: KEEP_ALIVE_SECS,
        max_inflight: MAX_INFLIGHT,
        max_reconnect_delay_ms: reconnect.sustained_delay,
        mqtt_version: MQTT_VERSION,
        time_to_wait_ms: TIME_TO_WAIT_MS,
        server_uris: config.server_uris.clone(),
    };

    Ok((options, summary))
}
