//! Controller configuration
//!
//! Loaded from a TOML file with three sections: `[device]`, `[mqtt]` and
//! `[control]`. Credentials are referenced by environment variable name and
//! resolved when the session config is built, never stored in the file.

use crate::ingress::{ControlTopic, PathSpec, PayloadDecoder};
use crate::transport::mqtt::{SessionConfig, DEFAULT_MQTTS_PORT, DEFAULT_MQTT_PORT};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// CA certificate embedded at build time, used when the config names none
const EMBEDDED_BROKER_CERT: Option<&str> = option_env!("BLINDCTL_BROKER_CERT_PEM");

const PEM_HEADER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_FOOTER: &str = "-----END CERTIFICATE-----";

/// Main controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    pub device: DeviceSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub control: ControlSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL, `mqtt://` or `mqtts://`
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// PEM file holding the broker CA
    pub ca_cert_file: Option<PathBuf>,
    /// Base64 certificate body, wrapped into PEM armor on load
    pub ca_cert_override: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Pause after a transport error before polling again
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlSection {
    #[serde(default = "default_root_topic")]
    pub root_topic: String,
    /// Slash-separated path to the position field
    #[serde(default = "default_value_path")]
    pub value_path: String,
    #[serde(default)]
    pub qos: u8,
    /// Require a `/` (or end of topic) after the root
    #[serde(default)]
    pub strict_topic_match: bool,
}

fn default_root_topic() -> String {
    crate::ingress::topic::DEFAULT_CONTROL_ROOT.to_string()
}

fn default_value_path() -> String {
    crate::ingress::path::DEFAULT_POSITION_PATH.to_string()
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            root_topic: default_root_topic(),
            value_path: default_value_path(),
            qos: 0,
            strict_topic_match: false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid value path: {0}")]
    InvalidPath(String),
}

/// Host, port and TLS flag parsed from the broker URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl ControllerConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;
        let endpoint = self.broker_endpoint()?;

        if self.mqtt.ca_cert_file.is_some() && self.mqtt.ca_cert_override.is_some() {
            return Err(ConfigError::InvalidConfig(
                "ca_cert_file and ca_cert_override are mutually exclusive".to_string(),
            ));
        }
        if !endpoint.tls && self.has_configured_certificate() {
            return Err(ConfigError::InvalidConfig(
                "A CA certificate requires an mqtts:// broker URL".to_string(),
            ));
        }
        if let Some(body) = &self.mqtt.ca_cert_override {
            if body.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "ca_cert_override is empty".to_string(),
                ));
            }
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "keep_alive_secs must be greater than 0".to_string(),
            ));
        }

        validate_root_topic(&self.control.root_topic)?;
        self.value_path()?;
        if self.control.qos > 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "qos must be 0, 1 or 2, got {}",
                self.control.qos
            )));
        }

        Ok(())
    }

    fn has_configured_certificate(&self) -> bool {
        self.mqtt.ca_cert_file.is_some() || self.mqtt.ca_cert_override.is_some()
    }

    /// Parse the broker URL into host, port and TLS flag
    pub fn broker_endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        let url = Url::parse(&self.mqtt.broker_url)
            .map_err(|e| ConfigError::InvalidBrokerUrl(format!("{}: {e}", self.mqtt.broker_url)))?;

        let (tls, default_port) = match url.scheme() {
            "mqtt" => (false, DEFAULT_MQTT_PORT),
            "mqtts" => (true, DEFAULT_MQTTS_PORT),
            other => {
                return Err(ConfigError::InvalidBrokerUrl(format!(
                    "Unsupported scheme '{other}', expected mqtt or mqtts"
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                ConfigError::InvalidBrokerUrl(format!("{} has no host", self.mqtt.broker_url))
            })?;

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port: url.port().unwrap_or(default_port),
            tls,
        })
    }

    pub fn value_path(&self) -> Result<PathSpec, ConfigError> {
        PathSpec::parse(&self.control.value_path)
            .map_err(|e| ConfigError::InvalidPath(e.to_string()))
    }

    pub fn control_topic(&self) -> ControlTopic {
        if self.control.strict_topic_match {
            ControlTopic::strict(&self.control.root_topic)
        } else {
            ControlTopic::new(&self.control.root_topic)
        }
    }

    pub fn payload_decoder(&self) -> Result<PayloadDecoder, ConfigError> {
        Ok(PayloadDecoder::new(self.value_path()?))
    }

    pub fn client_id(&self) -> String {
        format!("blindctl-{}", self.device.id)
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Result<Option<String>, ConfigError> {
        Self::get_env_var_configured(self.mqtt.username_env.as_deref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Result<Option<String>, ConfigError> {
        Self::get_env_var_configured(self.mqtt.password_env.as_deref())
    }

    /// A named variable must be set; no name means no value
    fn get_env_var_configured(env_var_name: Option<&str>) -> Result<Option<String>, ConfigError> {
        env_var_name
            .map(|name| {
                std::env::var(name).map_err(|_| ConfigError::EnvVarNotFound(name.to_string()))
            })
            .transpose()
    }

    /// Resolve the CA certificate: inline override, then file, then the
    /// build-time embedded PEM. Plain-TCP brokers never get one.
    pub fn resolve_certificate(&self) -> Result<Option<Bytes>, ConfigError> {
        if !self.broker_endpoint()?.tls {
            return Ok(None);
        }

        match (&self.mqtt.ca_cert_override, &self.mqtt.ca_cert_file) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidConfig(
                "ca_cert_file and ca_cert_override are mutually exclusive".to_string(),
            )),
            (Some(body), None) => Ok(Some(Bytes::from(wrap_pem_body(body)))),
            (None, Some(path)) => {
                let pem = std::fs::read(path)?;
                Ok(Some(Bytes::from(pem)))
            }
            (None, None) => Ok(EMBEDDED_BROKER_CERT
                .filter(|pem| !pem.trim().is_empty())
                .map(|pem| Bytes::from_static(pem.as_bytes()))),
        }
    }

    /// Build the session config: endpoint, credentials and certificate
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let endpoint = self.broker_endpoint()?;

        let mut session = SessionConfig::new(endpoint.host, endpoint.port, self.client_id());
        session.tls = endpoint.tls;
        session.username = self.get_mqtt_username()?;
        session.password = self.get_mqtt_password()?;
        session.certificate = self.resolve_certificate()?;
        session.keep_alive = Duration::from_secs(self.mqtt.keep_alive_secs);
        session.retry_delay = Duration::from_millis(self.mqtt.retry_delay_ms);
        session.qos = self.control.qos;

        Ok(session)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "test-blinds"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Wrap a bare base64 certificate body in PEM armor
pub fn wrap_pem_body(body: &str) -> String {
    let body = body.trim();
    if body.starts_with(PEM_HEADER) {
        return format!("{body}\n");
    }
    format!("{PEM_HEADER}\n{body}\n{PEM_FOOTER}\n")
}

fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidConfig(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

fn validate_root_topic(root: &str) -> Result<(), ConfigError> {
    if root.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "root_topic must not be empty".to_string(),
        ));
    }
    if root.contains(['#', '+']) {
        return Err(ConfigError::InvalidConfig(format!(
            "root_topic '{root}' must not contain wildcards"
        )));
    }
    // The subscription filter appends "/#"
    if root.starts_with('/') || root.ends_with('/') {
        return Err(ConfigError::InvalidConfig(format!(
            "root_topic '{root}' must not start or end with '/'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = ControllerConfig::test_config();
        config.validate().unwrap();

        assert_eq!(config.device.id, "test-blinds");
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.mqtt.retry_delay_ms, 1000);
        assert_eq!(config.control.root_topic, "blindcontrol");
        assert_eq!(config.control.value_path, "value");
        assert_eq!(config.control.qos, 0);
        assert!(!config.control.strict_topic_match);
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[device]
id = "livingroom.blinds"

[mqtt]
broker_url = "mqtts://broker.local:9883"
username_env = "BLINDCTL_TEST_UNUSED_USER"
ca_cert_override = "MIIBfake"
keep_alive_secs = 30
retry_delay_ms = 250

[control]
root_topic = "home/blinds"
value_path = "state/target/value"
qos = 1
strict_topic_match = true
"#;

        let config = ControllerConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.broker_endpoint().unwrap(),
            BrokerEndpoint {
                host: "broker.local".to_string(),
                port: 9883,
                tls: true,
            }
        );
        assert_eq!(
            config.value_path().unwrap().segments(),
            ["state", "target", "value"]
        );
        assert!(config.control_topic().is_strict());
        assert_eq!(config.control_topic().subscription_filter(), "home/blinds/#");
    }

    #[test]
    fn test_default_ports_by_scheme() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.broker_url = "mqtt://broker.local".to_string();
        assert_eq!(config.broker_endpoint().unwrap().port, 1883);

        config.mqtt.broker_url = "mqtts://broker.local".to_string();
        let endpoint = config.broker_endpoint().unwrap();
        assert_eq!(endpoint.port, 8883);
        assert!(endpoint.tls);
    }

    #[test]
    fn test_invalid_broker_url() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.broker_url = "http://broker.local:1883".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));

        config.mqtt.broker_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn test_invalid_device_id() {
        assert!(validate_device_id("invalid@blinds").is_err());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("valid-blinds_1.2").is_ok());
    }

    #[test]
    fn test_invalid_control_section() {
        let mut config = ControllerConfig::test_config();
        config.control.root_topic = "blindcontrol/#".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));

        let mut config = ControllerConfig::test_config();
        config.control.value_path = "//".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath(_))));

        let mut config = ControllerConfig::test_config();
        config.control.qos = 3;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_root_topic_slash_edges_rejected() {
        for root in ["blindcontrol/", "/blindcontrol", "/"] {
            let mut config = ControllerConfig::test_config();
            config.control.root_topic = root.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidConfig(_))),
                "{root}"
            );
        }

        // Inner separators are fine
        let mut config = ControllerConfig::test_config();
        config.control.root_topic = "home/blinds".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_conflicting_certificate_sources() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.broker_url = "mqtts://broker.local".to_string();
        config.mqtt.ca_cert_file = Some(PathBuf::from("certs/tls_cert.pem"));
        config.mqtt.ca_cert_override = Some("MIIB".to_string());

        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
        assert!(config.resolve_certificate().is_err());
    }

    #[test]
    fn test_certificate_requires_tls() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.ca_cert_override = Some("MIIB".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_plain_broker_has_no_certificate() {
        let config = ControllerConfig::test_config();
        assert_eq!(config.resolve_certificate().unwrap(), None);
    }

    #[test]
    fn test_override_is_wrapped_in_pem() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.broker_url = "mqtts://broker.local".to_string();
        config.mqtt.ca_cert_override = Some("  MIIBfake  ".to_string());

        let certificate = config.resolve_certificate().unwrap().unwrap();
        assert_eq!(
            &certificate[..],
            b"-----BEGIN CERTIFICATE-----\nMIIBfake\n-----END CERTIFICATE-----\n"
        );
    }

    #[test]
    fn test_wrap_pem_body_keeps_armored_input() {
        let armored = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";
        assert_eq!(wrap_pem_body(armored), format!("{armored}\n"));
    }

    #[test]
    fn test_missing_certificate_file() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.broker_url = "mqtts://broker.local".to_string();
        config.mqtt.ca_cert_file = Some(PathBuf::from("/nonexistent/blindctl/ca.pem"));

        assert!(matches!(
            config.resolve_certificate(),
            Err(ConfigError::FileRead(_))
        ));
    }

    #[test]
    fn test_missing_credential_env_var() {
        let mut config = ControllerConfig::test_config();
        config.mqtt.username_env = Some("BLINDCTL_TEST_SURELY_UNSET_USER".to_string());

        assert!(matches!(
            config.get_mqtt_username(),
            Err(ConfigError::EnvVarNotFound(name)) if name == "BLINDCTL_TEST_SURELY_UNSET_USER"
        ));
        assert!(config.session_config().is_err());
    }

    #[test]
    fn test_session_config_from_plain_config() {
        let config = ControllerConfig::test_config();
        let session = config.session_config().unwrap();

        assert_eq!(session.host, "localhost");
        assert_eq!(session.port, 1883);
        assert!(!session.tls);
        assert_eq!(session.username, None);
        assert_eq!(session.certificate, None);
        assert_eq!(session.client_id, "blindctl-test-blinds");
        assert_eq!(session.keep_alive, Duration::from_secs(60));
        assert_eq!(session.retry_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_config_serializes_back_to_toml() {
        let config = ControllerConfig::test_config();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let reparsed = ControllerConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(config, reparsed);
    }
}
