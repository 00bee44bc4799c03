//! Impure I/O for the control session
//!
//! Starts the rumqttc client, drives its event loop on a tokio task and feeds
//! every routed event into the [`ConnectionEventHandler`].

use super::connection::{configure_mqtt_options, qos_from_level, ConnectionState, SessionConfig};
use super::message_handler::MessageHandler;
use crate::error::{sanitize_error_message, IngressError, IngressResult};
use crate::ingress::{ConnectionEventHandler, ControlEvent};
use crate::transport::SubscribeRequester;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Capacity of the client request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Grace period for the event loop task on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Subscribe seam backed by the rumqttc client
#[derive(Clone)]
pub struct MqttSubscriber {
    client: AsyncClient,
    qos: QoS,
}

impl MqttSubscriber {
    pub fn new(client: AsyncClient, qos: QoS) -> Self {
        Self { client, qos }
    }
}

impl SubscribeRequester for MqttSubscriber {
    fn request_subscribe(&self, filter: &str) -> Result<(), IngressError> {
        // try_subscribe: the caller is the event loop that drains this channel
        self.client
            .try_subscribe(filter, self.qos)
            .map_err(|e| IngressError::subscribe_failed(filter, e.to_string()))
    }
}

/// Handle to a running control session
pub struct IngressSession {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    event_loop_handle: Option<JoinHandle<()>>,
}

/// Start the control session.
///
/// Builds transport options from `config`, spawns the event loop on the
/// current tokio runtime and returns immediately; connection and
/// subscription are acknowledged later through events. Nothing here retries:
/// a failure is returned as [`IngressError::TransportStartFailure`].
pub fn start_session(
    config: SessionConfig,
    handler: ConnectionEventHandler,
) -> IngressResult<IngressSession> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| IngressError::transport_start_failure(format!("No tokio runtime: {e}")))?;

    let qos = qos_from_level(config.qos)?;
    let mqtt_options = configure_mqtt_options(&config)?;
    let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

    let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) = setup_session_channels();
    let subscriber = MqttSubscriber::new(client.clone(), qos);

    info!(
        host = %config.host,
        port = config.port,
        tls = config.tls,
        client_id = %config.client_id,
        filter = %handler.topic().subscription_filter(),
        "Starting MQTT control session"
    );

    let span = crate::session_span!(host = %config.host, client_id = %config.client_id);
    let handle = runtime.spawn(
        run_event_loop(
            event_loop,
            subscriber,
            handler,
            state_tx,
            shutdown_rx,
            config.retry_delay,
        )
        .instrument(span),
    );

    Ok(IngressSession {
        client,
        state_rx,
        shutdown_tx,
        event_loop_handle: Some(handle),
    })
}

/// Create connection state and shutdown channels
#[allow(clippy::type_complexity)]
fn setup_session_channels() -> (
    (
        watch::Sender<ConnectionState>,
        watch::Receiver<ConnectionState>,
    ),
    (watch::Sender<bool>, watch::Receiver<bool>),
) {
    let state_channels = watch::channel(ConnectionState::Connecting);
    let shutdown_channels = watch::channel(false);
    (state_channels, shutdown_channels)
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    subscriber: MqttSubscriber,
    handler: ConnectionEventHandler,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
    retry_delay: Duration,
) {
    info!("MQTT event loop started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping MQTT event loop");
                    break;
                }
            }

            polled = event_loop.poll() => {
                match polled {
                    Ok(event) => {
                        let Some(control_event) = MessageHandler::route_mqtt_event(&event) else {
                            continue;
                        };
                        if let Some(state) = next_state(&control_event) {
                            let _ = state_tx.send(state);
                        }
                        let outcome = handler.handle(control_event, &subscriber);
                        debug!(?outcome, "MQTT event handled");
                    }
                    Err(e) => {
                        let reason = sanitize_error_message(&e.to_string());
                        let _ = state_tx.send(ConnectionState::Disconnected(reason.clone()));
                        handler.handle(ControlEvent::Error(reason), &subscriber);

                        // The transport reconnects on the next poll; pause so a dead broker
                        // does not turn this loop into a spin.
                        if !interruptible_sleep(shutdown_rx.clone(), retry_delay).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    let _ = state_tx.send(ConnectionState::Stopped);
    info!("MQTT event loop stopped");
}

/// Connection state implied by a control event, if any (pure function)
fn next_state(event: &ControlEvent) -> Option<ConnectionState> {
    match event {
        ControlEvent::Connected => Some(ConnectionState::Connected),
        ControlEvent::Disconnected => Some(ConnectionState::Disconnected(
            "Broker disconnected".to_string(),
        )),
        ControlEvent::Error(reason) => Some(ConnectionState::Disconnected(reason.clone())),
        _ => None,
    }
}

/// Sleep unless shutdown is requested first.
/// Returns true if sleep completed, false if shutdown requested
async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown_rx.borrow() {
        return false;
    }
    tokio::select! {
        changed = shutdown_rx.changed() => {
            changed.is_ok() && !*shutdown_rx.borrow()
        }
        _ = tokio::time::sleep(delay) => true,
    }
}

impl IngressSession {
    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection_state(), ConnectionState::Connected)
    }

    /// Wait until the broker acknowledges the connection.
    ///
    /// Disconnects while waiting are not fatal since the transport keeps
    /// retrying; only a stopped event loop or the timeout end the wait.
    pub async fn wait_until_connected(&self, timeout: Duration) -> IngressResult<()> {
        let mut state_rx = self.state_rx.clone();

        let waited = tokio::time::timeout(timeout, async {
            loop {
                match &*state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Stopped => {
                        return Err(IngressError::NotConnected {
                            state: ConnectionState::Stopped,
                        })
                    }
                    ConnectionState::Connecting | ConnectionState::Disconnected(_) => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(IngressError::NotConnected {
                        state: ConnectionState::Stopped,
                    });
                }
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => Err(IngressError::NotConnected {
                state: self.connection_state(),
            }),
        }
    }

    /// Disconnect from the broker and stop the event loop
    pub async fn shutdown(&mut self) -> IngressResult<()> {
        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect request not queued: {}", e);
        }

        let _ = self.shutdown_tx.send(true);
        info!("Sent shutdown signal to MQTT event loop");

        let Some(handle) = self.event_loop_handle.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(())) => {
                info!("MQTT event loop shut down gracefully");
                Ok(())
            }
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(IngressError::shutdown(format!("Event loop task failed: {e}"))),
            Err(_) => {
                warn!("MQTT event loop did not stop within {:?}", SHUTDOWN_GRACE);
                Err(IngressError::shutdown("Event loop did not stop in time"))
            }
        }
    }
}

impl Drop for IngressSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}
