//! Pure connection configuration for the MQTT session
//!
//! This module contains pure functions that turn a [`SessionConfig`] into
//! transport options, plus the connection state published by the session.

use crate::error::IngressError;
use bytes::Bytes;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;

/// Default plain MQTT port
pub const DEFAULT_MQTT_PORT: u16 = 1883;
/// Default MQTT over TLS port
pub const DEFAULT_MQTTS_PORT: u16 = 8883;

/// Connection state published by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Session started, no ConnAck yet
    Connecting,
    /// Broker acknowledged the connection
    Connected,
    /// Connection lost with reason; the transport retries on the next poll
    Disconnected(String),
    /// Event loop ended
    Stopped,
}

/// Everything needed to open the control session. Immutable once started.
#[derive(Clone, PartialEq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM-encoded CA certificate; `None` uses the platform trust store when `tls` is set
    pub certificate: Option<Bytes>,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Pause after a transport error before polling again
    pub retry_delay: Duration,
    pub qos: u8,
}

impl SessionConfig {
    /// Plain-TCP config with defaults, mostly useful in tests and tooling
    pub fn new<H: Into<String>, C: Into<String>>(host: H, port: u16, client_id: C) -> Self {
        Self {
            host: host.into(),
            port,
            tls: false,
            username: None,
            password: None,
            certificate: None,
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(60),
            retry_delay: Duration::from_secs(1),
            qos: 0,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("certificate_len", &self.certificate.as_ref().map(Bytes::len))
            .field("client_id", &self.client_id)
            .field("keep_alive", &self.keep_alive)
            .field("retry_delay", &self.retry_delay)
            .field("qos", &self.qos)
            .finish()
    }
}

/// Map a numeric QoS level onto the transport's type
pub fn qos_from_level(level: u8) -> Result<QoS, IngressError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(IngressError::transport_start_failure(format!(
            "Invalid QoS level {other}"
        ))),
    }
}

/// Pure function to configure MQTT options from a session config
pub fn configure_mqtt_options(config: &SessionConfig) -> Result<MqttOptions, IngressError> {
    if config.host.trim().is_empty() {
        return Err(IngressError::transport_start_failure("Broker host is empty"));
    }
    if config.port == 0 {
        return Err(IngressError::transport_start_failure("Broker port is 0"));
    }
    if config.client_id.is_empty() {
        return Err(IngressError::transport_start_failure("Client id is empty"));
    }

    let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
    mqtt_options.set_keep_alive(config.keep_alive);

    if let Some(username) = &config.username {
        let password = config.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username, &password);
    }

    if let Some(transport) = select_transport(config)? {
        mqtt_options.set_transport(transport);
    }

    Ok(mqtt_options)
}

/// Pick TLS with a pinned CA, TLS with platform roots, or plain TCP (`None`)
fn select_transport(config: &SessionConfig) -> Result<Option<RumqttcTransport>, IngressError> {
    match (&config.certificate, config.tls) {
        (Some(certificate), true) => {
            if !looks_like_pem(certificate) {
                return Err(IngressError::transport_start_failure(
                    "CA certificate is not PEM encoded",
                ));
            }
            Ok(Some(RumqttcTransport::tls(certificate.to_vec(), None, None)))
        }
        (None, true) => Ok(Some(RumqttcTransport::tls_with_default_config())),
        (Some(_), false) => Err(IngressError::transport_start_failure(
            "CA certificate supplied for a non-TLS broker",
        )),
        (None, false) => Ok(None),
    }
}

fn looks_like_pem(certificate: &[u8]) -> bool {
    const PEM_MARKER: &[u8] = b"-----BEGIN ";
    certificate
        .windows(PEM_MARKER.len())
        .any(|window| window == PEM_MARKER)
}
