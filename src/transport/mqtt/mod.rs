//! MQTT transport for the control session
//!
//! Split into pure and impure halves:
//! - `connection` turns a [`SessionConfig`] into transport options
//! - `message_handler` routes transport events onto control events
//! - `session` owns the client and the event loop task

pub mod connection;
pub mod message_handler;
pub mod session;

pub use connection::{
    configure_mqtt_options, qos_from_level, ConnectionState, SessionConfig, DEFAULT_MQTTS_PORT,
    DEFAULT_MQTT_PORT,
};
pub use message_handler::MessageHandler;
pub use session::{start_session, IngressSession, MqttSubscriber};
