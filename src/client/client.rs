//! Impure I/O: the managed client facade.
//!
//! Owns the single transport-client instance, the supervisor task that polls
//! the transport event loop, and the caller-facing connect/disconnect,
//! pub/sub, observer and snapshot operations. Callers are assumed to be a
//! single logical owner; event dispatch happens concurrently on the
//! supervisor task.

use super::connection::{
    derive_mqtt_options, qos_from_level, ConnectionState, OptionsSummary, ReconnectConfig,
    MAX_INFLIGHT,
};
use super::dispatch::{route_event, CallbackAdapter, CallbackRoute};
use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::events::{ClientId, Event, HandlerId, ObserverRegistry};
use crate::snapshot::Snapshot;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One live transport-client instance with its derived options and the
/// supervisor polling its event loop.
struct BrokerLink {
    client: AsyncClient,
    options: OptionsSummary,
    adapter: Arc<CallbackAdapter>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    supervisor: Option<JoinHandle<()>>,
}

/// Managed client facade over one logical broker connection.
///
/// The transport instance is created lazily on the first [`connect`] and
/// reused across reconnects; it is released only by an explicit
/// [`disconnect`]. At most one instance exists per client.
///
/// [`connect`]: MqttClient::connect
/// [`disconnect`]: MqttClient::disconnect
pub struct MqttClient {
    config: ClientConfig,
    name: ClientId,
    qos: QoS,
    reconnect: ReconnectConfig,
    observers: Arc<Mutex<ObserverRegistry>>,
    link: Option<BrokerLink>,
}

impl MqttClient {
    /// Validates the configuration and builds an unconnected client (the
    /// fluent path; call [`connect`](MqttClient::connect) afterwards).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let qos = qos_from_level(config.qos).ok_or(ConfigError::InvalidQos(config.qos))?;
        let name = ClientId::new(
            config
                .name
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        );

        Ok(Self {
            config,
            name,
            qos,
            reconnect: ReconnectConfig::default(),
            observers: Arc::new(Mutex::new(ObserverRegistry::new())),
            link: None,
        })
    }

    /// Builds a client from the structured configuration object and eagerly
    /// connects, mirroring the configuration-file construction path.
    pub async fn from_json(value: &serde_json::Value) -> Result<Self, ClientError> {
        let config = ClientConfig::from_json(value)?;
        let mut client = Self::new(config)?;
        client.connect().await?;
        Ok(client)
    }

    /// Overrides the reconnection backoff and connect timeout.
    pub fn with_reconnect_config(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// The logical client name used for event attribution.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Registers an event observer; returns the handle for deregistration.
    ///
    /// Observers run on the transport's callback task, in registration
    /// order, and must not block it for long durations.
    pub fn add_observer<F>(&self, observer: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.observers_guard().register(Box::new(observer))
    }

    /// Removes a previously registered observer by identity.
    pub fn remove_observer(&self, id: HandlerId) -> bool {
        self.observers_guard().deregister(id)
    }

    fn observers_guard(&self) -> std::sync::MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connects to the broker.
    ///
    /// The first call creates the transport client and its event-loop
    /// supervisor, then waits for the broker's acknowledgment. Calling
    /// `connect` while already connected is a no-op. A refused handshake or
    /// unreachable broker yields a connection error and retains no transport
    /// instance.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if let Some(link) = &self.link {
            if matches!(*link.state_rx.borrow(), ConnectionState::Connected) {
                debug!(client = %self.name, "connect: already connected");
                return Ok(());
            }
            // The existing instance is reconnecting on its own; wait for it
            // rather than racing a second transport client. A Disconnected
            // report here is a backoff window, not a terminal failure.
            return wait_for_reconnection(link.state_rx.clone(), self.reconnect.connect_timeout)
                .await;
        }

        let (options, summary) = derive_mqtt_options(&self.config, &self.reconnect)?;
        let (client, event_loop) = AsyncClient::new(options, MAX_INFLIGHT as usize);
        let adapter = Arc::new(CallbackAdapter::new(
            self.name.clone(),
            self.config.notify_delivery,
            self.observers.clone(),
        ));

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = tokio::spawn(run_event_loop(
            event_loop,
            state_tx,
            shutdown_rx,
            adapter.clone(),
            self.reconnect.clone(),
            self.name.clone(),
        ));

        if let Err(e) =
            wait_for_connection(state_rx.clone(), self.reconnect.connect_timeout).await
        {
            let _ = shutdown_tx.send(true);
            supervisor.abort();
            return Err(e);
        }

        self.link = Some(BrokerLink {
            client,
            options: summary,
            adapter,
            state_rx,
            shutdown_tx,
            supervisor: Some(supervisor),
        });
        info!(client = %self.name, endpoint = %self.config.endpoint, "connected to broker");
        Ok(())
    }

    /// Gracefully disconnects and releases the transport instance.
    ///
    /// Not idempotent: calling `disconnect` without a prior successful
    /// connect, or a second time, is a connection error, matching the
    /// transport's contract.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        let mut link = self.link.take().ok_or_else(|| {
            ClientError::Connection("disconnect called while not connected".to_string())
        })?;

        // Enqueue the disconnect before signaling shutdown: the supervisor
        // owns the event loop, and stopping it first can close the request
        // channel under a perfectly valid disconnect.
        let result = link
            .client
            .disconnect()
            .await
            .map_err(|e| ClientError::ConnectionFailed(Box::new(e)));
        let _ = link.shutdown_tx.send(true);

        if let Some(handle) = link.supervisor.take() {
            let abort = handle.abort_handle();
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!(client = %self.name, "event loop shut down cleanly"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!(client = %self.name, error = %e, "event loop task ended with error");
                }
                Err(_) => {
                    warn!(client = %self.name, "event loop did not stop in time, aborting");
                    abort.abort();
                }
                _ => {}
            }
        }

        info!(client = %self.name, "disconnected from broker");
        result
    }

    /// Whether the client currently holds an established connection. Returns
    /// false, never an error, when no transport instance exists yet.
    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| matches!(*link.state_rx.borrow(), ConnectionState::Connected))
    }

    /// Current connection state, or `None` before the first connect.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.link.as_ref().map(|link| link.state_rx.borrow().clone())
    }

    fn connected_link(&self) -> Result<&BrokerLink, ClientError> {
        let link = self
            .link
            .as_ref()
            .ok_or_else(|| ClientError::Operation("not connected".to_string()))?;
        let state = link.state_rx.borrow().clone();
        if !matches!(state, ConnectionState::Connected) {
            return Err(ClientError::Operation(format!(
                "not connected - current state: {state:?}"
            )));
        }
        Ok(link)
    }

    /// Requests delivery of all future messages matching `topic` at the
    /// configured default QoS. Broker wildcard syntax (`+`, `#`) is passed
    /// through verbatim, not interpreted locally.
    pub async fn subscribe(&self, topic: &str) -> Result<(), ClientError> {
        let link = self.connected_link()?;
        link.client
            .subscribe(topic, self.qos)
            .await
            .map_err(|e| ClientError::OperationFailed(Box::new(e)))?;
        debug!(client = %self.name, topic, "subscribed");
        Ok(())
    }

    /// Cancels a prior subscription. Unsubscribing a topic that was never
    /// subscribed is deferred entirely to the broker's semantics.
    pub async fn unsubscribe(&self, topic: &str) -> Result<(), ClientError> {
        let link = self.connected_link()?;
        link.client
            .unsubscribe(topic)
            .await
            .map_err(|e| ClientError::OperationFailed(Box::new(e)))?;
        debug!(client = %self.name, topic, "unsubscribed");
        Ok(())
    }

    /// Publishes `payload` to `topic` at the configured default QoS.
    ///
    /// Returns once the transport accepts the send request. For QoS >= 1 the
    /// acknowledgment is reported asynchronously as a `MessageSent` event,
    /// and only when delivery events are enabled.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), ClientError> {
        let link = self.connected_link()?;
        link.client
            .publish(topic, self.qos, false, payload.into())
            .await
            .map_err(|e| ClientError::OperationFailed(Box::new(e)))?;
        debug!(client = %self.name, topic, "publish accepted");
        Ok(())
    }

    /// Produces a read-only view of the connection identity, derived options
    /// and pending delivery tokens. Fails before the first successful
    /// connect, when no transport instance exists to introspect.
    pub fn snapshot(&self) -> Result<Snapshot, ClientError> {
        let link = self.link.as_ref().ok_or(ClientError::NotConnected)?;
        let options = &link.options;

        Ok(Snapshot {
            id: options.client_id.clone(),
            current_server_uri: options.server_uri.clone(),
            pending_delivery_tokens: link.adapter.pending_tokens(),
            server_uri: options.server_uri.clone(),
            time_to_wait: options.time_to_wait_ms,
            username: options.username.clone(),
            connection_timeout: options.connection_timeout_secs,
            keepalive_interval: options.keepalive_secs,
            max_inflight: options.max_inflight,
            max_reconnect_delay: options.max_reconnect_delay_ms,
            mqtt_version: options.mqtt_version,
            server_uris: options.server_uris.clone(),
        })
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // No async teardown in Drop; callers wanting a graceful disconnect
        // must call disconnect() explicitly.
        if let Some(link) = &mut self.link {
            let _ = link.shutdown_tx.send(true);
            if let Some(handle) = link.supervisor.take() {
                handle.abort();
            }
        }
    }
}

/// Waits until the supervisor reports an established connection, or fails
/// with the reported cause or a timeout.
async fn wait_for_connection(
    mut state_rx: watch::Receiver<ConnectionState>,
    timeout: Duration,
) -> Result<(), ClientError> {
    let outcome = tokio::time::timeout(timeout, async {
        loop {
            let state = state_rx.borrow_and_update().clone();
            match state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected(reason) => {
                    return Err(ClientError::Connection(reason));
                }
                ConnectionState::Connecting | ConnectionState::Reconnecting(_) => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(ClientError::Connection(
                    "connection supervisor stopped".to_string(),
                ));
            }
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(ClientError::Connection(
            "timed out waiting for broker acknowledgment".to_string(),
        )),
    }
}

/// Waits for a link that is already reconnecting on its own to come back.
///
/// Unlike [`wait_for_connection`], a `Disconnected` report is transient here:
/// the supervisor keeps retrying after it, so only the timeout or a stopped
/// supervisor fails the wait.
async fn wait_for_reconnection(
    mut state_rx: watch::Receiver<ConnectionState>,
    timeout: Duration,
) -> Result<(), ClientError> {
    let outcome = tokio::time::timeout(timeout, async {
        loop {
            if matches!(*state_rx.borrow_and_update(), ConnectionState::Connected) {
                return Ok(());
            }
            if state_rx.changed().await.is_err() {
                return Err(ClientError::Connection(
                    "connection supervisor stopped".to_string(),
                ));
            }
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(ClientError::Connection(
            "timed out waiting for reconnection".to_string(),
        )),
    }
}

/// Sleeps `delay_ms` unless shutdown is requested first. Returns false when
/// the wait was interrupted by shutdown.
async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
    }
}

/// Supervisor bookkeeping carried between poll results.
struct SupervisorState {
    session_up: bool,
    attempts: u32,
}

impl SupervisorState {
    fn new() -> Self {
        Self {
            session_up: false,
            attempts: 0,
        }
    }
}

/// Applies one routed transport event to the supervisor state. Returns the
/// backoff delay to sleep when the connection is down, `None` to keep
/// polling.
fn apply_route(
    state: &mut SupervisorState,
    route: CallbackRoute,
    adapter: &CallbackAdapter,
    state_tx: &watch::Sender<ConnectionState>,
    reconnect: &ReconnectConfig,
    name: &ClientId,
) -> Option<u64> {
    let cause = match route {
        CallbackRoute::ConnectionAcknowledged => {
            if state.attempts > 0 {
                // Recovery is deliberately not an event; observers only
                // ever see ConnectionLost.
                info!(client = %name, "session re-established");
            }
            state.session_up = true;
            state.attempts = 0;
            let _ = state_tx.send(ConnectionState::Connected);
            return None;
        }
        CallbackRoute::ConnectionRefused { reason } => reason,
        CallbackRoute::BrokerDisconnect { reason } => reason,
        route => {
            adapter.handle(route);
            return None;
        }
    };
    Some(connection_down(
        state, cause, adapter, state_tx, reconnect, name,
    ))
}

/// Records a connection drop: notifies observers once per established
/// session, publishes the new state, and returns the backoff delay before
/// the next poll re-establishes the session.
fn connection_down(
    state: &mut SupervisorState,
    cause: String,
    adapter: &CallbackAdapter,
    state_tx: &watch::Sender<ConnectionState>,
    reconnect: &ReconnectConfig,
    name: &ClientId,
) -> u64 {
    if state.session_up {
        warn!(client = %name, %cause, "connection lost");
        adapter.connection_lost(cause.as_str());
        state.session_up = false;
    }
    state.attempts += 1;
    let _ = state_tx.send(if state.attempts == 1 {
        ConnectionState::Disconnected(cause)
    } else {
        ConnectionState::Reconnecting(state.attempts)
    });
    reconnect.backoff_delay(state.attempts)
}

/// Supervisor: polls the transport event loop, routes callbacks into the
/// adapter, tracks connection state, and backs off between reconnection
/// attempts. This task is the transport's callback context; observers run
/// here.
async fn run_event_loop(
    mut event_loop: EventLoop,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
    adapter: Arc<CallbackAdapter>,
    reconnect: ReconnectConfig,
    name: ClientId,
) {
    info!(client = %name, "transport event loop started");
    let mut state = SupervisorState::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!(client = %name, "shutdown requested, stopping event loop");
                    break;
                }
            }
            polled = event_loop.poll() => {
                let backoff = match polled {
                    Ok(event) => apply_route(
                        &mut state, route_event(&event), &adapter, &state_tx, &reconnect, &name,
                    ),
                    Err(e) => Some(connection_down(
                        &mut state, e.to_string(), &adapter, &state_tx, &reconnect, &name,
                    )),
                };

                if let Some(delay) = backoff {
                    debug!(
                        client = %name, attempts = state.attempts, delay_ms = delay,
                        "retrying after backoff"
                    );
                    if !interruptible_sleep(shutdown_rx.clone(), delay).await {
                        break;
                    }
                }
            }
        }
    }
    info!(client = %name, "transport event loop stopped");
}
