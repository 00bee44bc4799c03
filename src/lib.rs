//! blindctl - MQTT control ingress for a window-blind controller
//!
//! Subscribes to a control topic tree, decodes JSON commands into a target
//! blind position (0-100 %), and hands the newest target to motor control
//! through a single overwriting slot.
//!
//! # Overview
//!
//! - [`ingress`] - topic filter, payload decoder, event handler and handoff
//! - [`transport`] - MQTT session driving the event loop
//! - [`config`] - TOML configuration
//! - [`observability`] - structured logging and ingress metrics
//!
//! # Quick Start
//!
//! ```rust
//! use blindctl::ingress::{PayloadDecoder, PathSpec, PositionHandoff};
//!
//! let decoder = PayloadDecoder::new(PathSpec::parse("state/target").unwrap());
//! let position = decoder.decode(br#"{"state": {"target": 40}}"#).unwrap();
//!
//! let handoff = PositionHandoff::new();
//! handoff.write(position);
//! assert_eq!(handoff.read().map(|p| p.percent()), Some(40));
//! assert_eq!(handoff.read(), None);
//! ```

pub mod config;
pub mod error;
pub mod ingress;
pub mod observability;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, ControllerConfig};
pub use error::{DecodeError, IngressError, IngressResult};
pub use ingress::{
    BlindPosition, ConnectionEventHandler, ControlEvent, ControlTopic, HandlerOutcome,
    PayloadDecoder, PositionHandoff,
};
pub use transport::mqtt::{start_session, IngressSession, SessionConfig};
