//! Thread-safe ingress metrics
//!
//! Atomic counters for connection lifecycle, received control messages and
//! decode outcomes. A process-wide instance is available through
//! [`metrics()`]; components accept any `&'static IngressMetrics` so tests can
//! use their own.

use crate::error::DecodeError;
use crate::ingress::BlindPosition;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<IngressMetrics> = Lazy::new(IngressMetrics::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static IngressMetrics {
    &METRICS
}

const NO_POSITION: u8 = u8::MAX;

/// Decode failure counters, one per [`DecodeError`] kind
#[derive(Debug, Default)]
struct DecodeFailureCounters {
    empty_input: AtomicU64,
    field_not_found: AtomicU64,
    type_mismatch: AtomicU64,
    out_of_range: AtomicU64,
    parse_error: AtomicU64,
}

impl DecodeFailureCounters {
    fn counter(&self, error: &DecodeError) -> &AtomicU64 {
        match error {
            DecodeError::EmptyInput => &self.empty_input,
            DecodeError::FieldNotFound { .. } => &self.field_not_found,
            DecodeError::TypeMismatch { .. } => &self.type_mismatch,
            DecodeError::OutOfRange { .. } | DecodeError::OutOfRangeFloat { .. } => {
                &self.out_of_range
            }
            DecodeError::ParseError { .. } => &self.parse_error,
        }
    }

    fn snapshot(&self) -> DecodeFailureSnapshot {
        DecodeFailureSnapshot {
            empty_input: self.empty_input.load(Ordering::Relaxed),
            field_not_found: self.field_not_found.load(Ordering::Relaxed),
            type_mismatch: self.type_mismatch.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            parse_error: self.parse_error.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.empty_input,
            &self.field_not_found,
            &self.type_mismatch,
            &self.out_of_range,
            &self.parse_error,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Counters for the ingress path
#[derive(Debug)]
pub struct IngressMetrics {
    // Connection lifecycle
    mqtt_connected: AtomicBool,
    connections_established: AtomicU64,
    connections_lost: AtomicU64,
    transport_errors: AtomicU64,
    subscribe_requests: AtomicU64,
    subscribe_failures: AtomicU64,
    unrecognized_events: AtomicU64,

    // Control messages
    messages_received: AtomicU64,
    messages_ignored: AtomicU64,
    positions_stored: AtomicU64,
    positions_superseded: AtomicU64,
    last_position: AtomicU8,
    last_position_at: AtomicU64,
    decode_failures: DecodeFailureCounters,

    started_at: AtomicU64,
}

impl IngressMetrics {
    pub fn new() -> Self {
        Self {
            mqtt_connected: AtomicBool::new(false),
            connections_established: AtomicU64::new(0),
            connections_lost: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            subscribe_requests: AtomicU64::new(0),
            subscribe_failures: AtomicU64::new(0),
            unrecognized_events: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_ignored: AtomicU64::new(0),
            positions_stored: AtomicU64::new(0),
            positions_superseded: AtomicU64::new(0),
            last_position: AtomicU8::new(NO_POSITION),
            last_position_at: AtomicU64::new(0),
            decode_failures: DecodeFailureCounters::default(),
            started_at: AtomicU64::new(current_timestamp()),
        }
    }

    // Connection lifecycle
    pub fn mqtt_connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(true, Ordering::Relaxed);
    }

    pub fn mqtt_connection_lost(&self) {
        self.connections_lost.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(false, Ordering::Relaxed);
    }

    pub fn mqtt_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(false, Ordering::Relaxed);
    }

    pub fn subscribe_requested(&self) {
        self.subscribe_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscribe_failed(&self) {
        self.subscribe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unrecognized_event(&self) {
        self.unrecognized_events.fetch_add(1, Ordering::Relaxed);
    }

    // Control messages
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_ignored(&self) {
        self.messages_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn position_stored(&self, position: BlindPosition, superseded: bool) {
        self.positions_stored.fetch_add(1, Ordering::Relaxed);
        if superseded {
            self.positions_superseded.fetch_add(1, Ordering::Relaxed);
        }
        self.last_position.store(position.percent(), Ordering::Relaxed);
        self.last_position_at.store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn decode_failed(&self, error: &DecodeError) {
        self.decode_failures.counter(error).fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.mqtt_connected.load(Ordering::Relaxed)
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        self.mqtt_connected.store(false, Ordering::Relaxed);
        for counter in [
            &self.connections_established,
            &self.connections_lost,
            &self.transport_errors,
            &self.subscribe_requests,
            &self.subscribe_failures,
            &self.unrecognized_events,
            &self.messages_received,
            &self.messages_ignored,
            &self.positions_stored,
            &self.positions_superseded,
            &self.last_position_at,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.last_position.store(NO_POSITION, Ordering::Relaxed);
        self.decode_failures.reset();
        self.started_at.store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let last_position_at = self.last_position_at.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: now.saturating_sub(self.started_at.load(Ordering::Relaxed)),
            mqtt: MqttSnapshot {
                connected: self.mqtt_connected.load(Ordering::Relaxed),
                connections_established: self.connections_established.load(Ordering::Relaxed),
                connections_lost: self.connections_lost.load(Ordering::Relaxed),
                transport_errors: self.transport_errors.load(Ordering::Relaxed),
                subscribe_requests: self.subscribe_requests.load(Ordering::Relaxed),
                subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
                unrecognized_events: self.unrecognized_events.load(Ordering::Relaxed),
            },
            control: ControlSnapshot {
                messages_received: self.messages_received.load(Ordering::Relaxed),
                messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
                positions_stored: self.positions_stored.load(Ordering::Relaxed),
                positions_superseded: self.positions_superseded.load(Ordering::Relaxed),
                last_position: BlindPosition::new(self.last_position.load(Ordering::Relaxed))
                    .map(u8::from),
                seconds_since_last_position: (last_position_at > 0)
                    .then(|| now.saturating_sub(last_position_at)),
                decode_failures: self.decode_failures.snapshot(),
            },
        }
    }
}

impl Default for IngressMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of all counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub mqtt: MqttSnapshot,
    pub control: ControlSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct MqttSnapshot {
    pub connected: bool,
    pub connections_established: u64,
    pub connections_lost: u64,
    pub transport_errors: u64,
    pub subscribe_requests: u64,
    pub subscribe_failures: u64,
    pub unrecognized_events: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub messages_received: u64,
    pub messages_ignored: u64,
    pub positions_stored: u64,
    pub positions_superseded: u64,
    pub last_position: Option<u8>,
    pub seconds_since_last_position: Option<u64>,
    pub decode_failures: DecodeFailureSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeFailureSnapshot {
    pub empty_input: u64,
    pub field_not_found: u64,
    pub type_mismatch: u64,
    pub out_of_range: u64,
    pub parse_error: u64,
}

impl DecodeFailureSnapshot {
    pub fn total(&self) -> u64 {
        self.empty_input
            + self.field_not_found
            + self.type_mismatch
            + self.out_of_range
            + self.parse_error
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
