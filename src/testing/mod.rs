//! Testing utilities and mock implementations
//!
//! Lets the ingress path be tested without an MQTT broker.

pub mod mocks;

pub use mocks::*;
