//! Transport layer for the control session
//!
//! The ingress core only needs one thing from the transport while handling
//! events: the ability to request a subscription. That seam is the
//! [`SubscribeRequester`] trait, implemented for the MQTT client and mocked
//! in tests.

use crate::error::IngressError;

pub mod mqtt;

/// Issues subscribe requests without waiting for the acknowledgment.
///
/// The acknowledgment arrives later as a separate transport event.
/// Implementations must not block: they are called from inside the
/// transport's own event loop.
pub trait SubscribeRequester: Send + Sync {
    fn request_subscribe(&self, filter: &str) -> Result<(), IngressError>;
}
