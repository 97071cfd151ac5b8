//! Integration tests for the managed client facade.
//!
//! These run without a live broker: they exercise construction, validation,
//! lifecycle guard rails, and fast connect failures against an unreachable
//! endpoint.

use mqbus::{ClientConfig, ClientError, ConfigError, MqttClient, ReconnectConfig};
use serde_json::json;
use std::time::Duration;

fn unreachable_config() -> ClientConfig {
    // Port 1 is essentially never listening; connection is refused immediately.
    ClientConfig::new("tcp://127.0.0.1:1").name("integration-test")
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        backoff_pattern: vec![10, 10],
        sustained_delay: 10,
        connect_timeout: Duration::from_millis(500),
    }
}

#[test]
fn test_client_from_fluent_config() {
    let config = ClientConfig::new("tcp://localhost:1883")
        .name("fluent-client")
        .username("user")
        .password("pass")
        .qos(1)
        .notify_delivery(true);

    let client = MqttClient::new(config).unwrap();
    assert_eq!(client.name(), "fluent-client");
    assert!(!client.is_connected());
}

#[test]
fn test_client_name_generated_when_absent() {
    let first = MqttClient::new(ClientConfig::new("tcp://localhost:1883")).unwrap();
    let second = MqttClient::new(ClientConfig::new("tcp://localhost:1883")).unwrap();

    assert!(!first.name().is_empty());
    assert_ne!(first.name(), second.name());
}

#[test]
fn test_structured_config_validation_failures() {
    let missing_endpoint = ClientConfig::from_json(&json!({ "name": "Q2" }));
    assert!(matches!(
        missing_endpoint,
        Err(ConfigError::MissingField("endpoint"))
    ));

    let bad_qos = ClientConfig::from_json(&json!({
        "endpoint": "tcp://localhost:1883",
        "qos": 7,
    }));
    assert!(matches!(bad_qos, Err(ConfigError::InvalidQos(7))));

    let lone_username = ClientConfig::from_json(&json!({
        "endpoint": "tcp://localhost:1883",
        "username": "user",
    }));
    assert!(matches!(lone_username, Err(ConfigError::PartialCredentials)));
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let result = MqttClient::new(ClientConfig::new("tcp://localhost:1883").qos(9));
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_disconnect_without_connect_is_connection_error() {
    let mut client = MqttClient::new(unreachable_config()).unwrap();
    let result = client.disconnect().await;
    assert!(result.is_err_and(|e| e.is_connection()));
}

#[tokio::test]
async fn test_snapshot_before_connect_is_not_connected() {
    let client = MqttClient::new(unreachable_config()).unwrap();
    assert!(matches!(client.snapshot(), Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn test_operations_before_connect_are_operation_errors() {
    let client = MqttClient::new(unreachable_config()).unwrap();

    assert!(client.subscribe("a/b").await.is_err_and(|e| e.is_operation()));
    assert!(client.unsubscribe("a/b").await.is_err_and(|e| e.is_operation()));
    assert!(client
        .publish("a/b", b"payload".to_vec())
        .await
        .is_err_and(|e| e.is_operation()));
}

#[tokio::test]
async fn test_connect_to_unreachable_broker_fails_and_keeps_no_instance() {
    let mut client = MqttClient::new(unreachable_config())
        .unwrap()
        .with_reconnect_config(fast_reconnect());

    let result = client.connect().await;
    assert!(result.is_err_and(|e| e.is_connection()));

    // A failed first connect must leave the client exactly as before:
    // no transport instance, so the snapshot still reports NotConnected.
    assert!(!client.is_connected());
    assert!(matches!(client.snapshot(), Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn test_eager_construction_surfaces_connect_failure() {
    // The structured-config path connects eagerly, so an unreachable broker
    // fails construction rather than deferring the error. A short backoff is
    // not injectable here, so keep the refused endpoint local and fast.
    let value = json!({
        "endpoint": "tcp://127.0.0.1:1",
        "name": "eager",
    });

    let result = tokio::time::timeout(Duration::from_secs(5), MqttClient::from_json(&value)).await;
    match result {
        Ok(Err(e)) => assert!(e.is_connection()),
        Ok(Ok(_)) => panic!("connect to an unreachable broker must fail"),
        Err(_) => panic!("connect failure must surface promptly, not hang"),
    }
}

#[tokio::test]
async fn test_observer_lifecycle_via_facade() {
    let client = MqttClient::new(unreachable_config()).unwrap();

    let first = client.add_observer(|_| {});
    let second = client.add_observer(|_| {});
    assert_ne!(first, second);

    assert!(client.remove_observer(first));
    assert!(!client.remove_observer(first));
    assert!(client.remove_observer(second));
}
