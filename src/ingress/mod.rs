//! Control message ingress
//!
//! Receive pipeline from transport event to motor-control handoff:
//!
//! - [`path`] - walk a parsed payload to the position field
//! - [`decoder`] - parse payload bytes and extract the position
//! - [`event_handler`] - react to transport lifecycle events
//! - [`handoff`] - single-slot overwriting cell read by the motor task
//! - [`topic`] - control topic subscription and filtering

pub mod decoder;
pub mod event_handler;
pub mod handoff;
pub mod path;
pub mod position;
pub mod topic;

pub use decoder::PayloadDecoder;
pub use event_handler::{ConnectionEventHandler, ControlEvent, ControlMessage, HandlerOutcome};
pub use handoff::PositionHandoff;
pub use path::{extract_position, PathSpec, PathSpecError};
pub use position::BlindPosition;
pub use topic::ControlTopic;
