//! Client configuration.
//!
//! Two construction paths are supported: a structured JSON object (field
//! names match the original wire keys, e.g. `notify-delivery`) and a bare
//! endpoint with fluent setters applied before the first connect. Validation
//! happens once, when the configuration is handed to
//! [`MqttClient::new`](crate::MqttClient::new).

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while parsing or validating a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid qos level {0}: must be 0, 1 or 2")]
    InvalidQos(u8),

    #[error("username and password must be set together")]
    PartialCredentials,

    #[error("invalid endpoint URI: {0}")]
    InvalidEndpoint(String),

    #[error("malformed configuration")]
    Malformed(#[source] serde_json::Error),
}

fn default_qos() -> u8 {
    2
}

/// Immutable client configuration.
///
/// Unrecognized fields in the structured form are ignored. The logical `name`
/// defaults to a generated UUID when absent; credentials must be provided as
/// a pair or not at all.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Broker URI, e.g. `tcp://localhost:1883` or `mqtts://broker:8883`.
    pub endpoint: String,

    /// Default quality-of-service level for subscribe and publish (0-2).
    #[serde(default = "default_qos")]
    pub qos: u8,

    /// Logical client name used for event attribution.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Whether delivery acknowledgments are surfaced as `MessageSent` events.
    #[serde(rename = "notify-delivery", default)]
    pub notify_delivery: bool,

    /// Candidate broker URIs, reported by the snapshot when configured.
    #[serde(rename = "server-uris", default)]
    pub server_uris: Option<Vec<String>>,
}

impl ClientConfig {
    /// Starts a fluent configuration from a bare endpoint URI.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            qos: default_qos(),
            name: None,
            username: None,
            password: None,
            notify_delivery: false,
            server_uris: None,
        }
    }

    /// Parses the structured configuration object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if value.get("endpoint").is_none() {
            return Err(ConfigError::MissingField("endpoint"));
        }
        let config: ClientConfig =
            serde_json::from_value(value.clone()).map_err(ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn qos(mut self, qos: u8) -> Self {
        self.qos = qos;
        self
    }

    pub fn notify_delivery(mut self, notify_delivery: bool) -> Self {
        self.notify_delivery = notify_delivery;
        self
    }

    pub fn server_uris(mut self, uris: Vec<String>) -> Self {
        self.server_uris = Some(uris);
        self
    }

    /// Checks the configuration invariants: a non-empty endpoint, a QoS level
    /// in range, and credentials that are either both present or both absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingField("endpoint"));
        }
        if self.qos > 2 {
            return Err(ConfigError::InvalidQos(self.qos));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::PartialCredentials);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fluent_defaults() {
        let config = ClientConfig::new("tcp://localhost:1883");
        assert_eq!(config.qos, 2);
        assert_eq!(config.name, None);
        assert!(!config.notify_delivery);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fluent_setters_chain() {
        let config = ClientConfig::new("tcp://localhost:1883")
            .name("Q1")
            .username("u")
            .password("p")
            .qos(1)
            .notify_delivery(true);

        assert_eq!(config.name.as_deref(), Some("Q1"));
        assert_eq!(config.username.as_deref(), Some("u"));
        assert_eq!(config.password.as_deref(), Some("p"));
        assert_eq!(config.qos, 1);
        assert!(config.notify_delivery);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_qos_rejected() {
        let config = ClientConfig::new("tcp://localhost:1883").qos(3);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidQos(3))));
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let username_only = ClientConfig::new("tcp://localhost:1883").username("u");
        assert!(matches!(
            username_only.validate(),
            Err(ConfigError::PartialCredentials)
        ));

        let password_only = ClientConfig::new("tcp://localhost:1883").password("p");
        assert!(matches!(
            password_only.validate(),
            Err(ConfigError::PartialCredentials)
        ));

        let both = ClientConfig::new("tcp://localhost:1883")
            .username("u")
            .password("p");
        assert!(both.validate().is_ok());

        let neither = ClientConfig::new("tcp://localhost:1883");
        assert!(neither.validate().is_ok());
    }

    #[test]
    fn test_from_json_full_object() {
        let value = json!({
            "endpoint": "tcp://localhost:1883",
            "name": "Q2",
            "qos": 1,
            "username": "some-username",
            "password": "some-password",
            "notify-delivery": true,
        });

        let config = ClientConfig::from_json(&value).unwrap();
        assert_eq!(config.endpoint, "tcp://localhost:1883");
        assert_eq!(config.name.as_deref(), Some("Q2"));
        assert_eq!(config.qos, 1);
        assert_eq!(config.username.as_deref(), Some("some-username"));
        assert!(config.notify_delivery);
        assert_eq!(config.server_uris, None);
    }

    #[test]
    fn test_from_json_defaults_applied() {
        let value = json!({ "endpoint": "tcp://localhost:1883" });
        let config = ClientConfig::from_json(&value).unwrap();

        assert_eq!(config.qos, 2);
        assert_eq!(config.name, None);
        assert_eq!(config.username, None);
        assert!(!config.notify_delivery);
    }

    #[test]
    fn test_from_json_missing_endpoint() {
        let value = json!({ "name": "Q2" });
        let result = ClientConfig::from_json(&value);
        assert!(matches!(result, Err(ConfigError::MissingField("endpoint"))));
    }

    #[test]
    fn test_from_json_ignores_unknown_fields() {
        let value = json!({
            "endpoint": "tcp://localhost:1883",
            "unrelated": {"nested": true},
        });
        assert!(ClientConfig::from_json(&value).is_ok());
    }

    #[test]
    fn test_from_json_partial_credentials() {
        let value = json!({
            "endpoint": "tcp://localhost:1883",
            "username": "only-one",
        });
        let result = ClientConfig::from_json(&value);
        assert!(matches!(result, Err(ConfigError::PartialCredentials)));
    }

    #[test]
    fn test_from_json_server_uris() {
        let value = json!({
            "endpoint": "tcp://localhost:1883",
            "server-uris": ["tcp://a:1883", "tcp://b:1883"],
        });
        let config = ClientConfig::from_json(&value).unwrap();
        assert_eq!(
            config.server_uris,
            Some(vec!["tcp://a:1883".to_string(), "tcp://b:1883".to_string()])
        );
    }
}
