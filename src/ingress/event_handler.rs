//! Reaction to transport lifecycle events
//!
//! The transport owns connection state; this handler only reacts to discrete
//! events. Every branch returns a [`HandlerOutcome`]. Decode and subscribe
//! failures are logged and counted here and never reach the transport, so a
//! malformed message cannot disturb the connection.

use super::decoder::PayloadDecoder;
use super::handoff::PositionHandoff;
use super::position::BlindPosition;
use super::topic::ControlTopic;
use crate::error::DecodeError;
use crate::observability::metrics::{metrics, IngressMetrics};
use crate::transport::SubscribeRequester;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inbound publish as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub topic: Bytes,
    pub payload: Bytes,
}

impl ControlMessage {
    pub fn new(topic: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Topic for log output
    pub fn topic_lossy(&self) -> String {
        String::from_utf8_lossy(&self.topic).into_owned()
    }
}

/// Transport lifecycle events the ingress path reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Connected,
    Disconnected,
    Subscribed { packet_id: u16 },
    Unsubscribed { packet_id: u16 },
    Published { packet_id: u16 },
    Data(ControlMessage),
    Error(String),
    /// Event kind with no handling; carries the raw kind name
    Unrecognized(String),
}

impl ControlEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlEvent::Connected => "connected",
            ControlEvent::Disconnected => "disconnected",
            ControlEvent::Subscribed { .. } => "subscribed",
            ControlEvent::Unsubscribed { .. } => "unsubscribed",
            ControlEvent::Published { .. } => "published",
            ControlEvent::Data(_) => "data",
            ControlEvent::Error(_) => "error",
            ControlEvent::Unrecognized(_) => "unrecognized",
        }
    }
}

/// What the handler did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    SubscribeRequested { filter: String },
    SubscribeRequestFailed { filter: String },
    PositionStored {
        position: BlindPosition,
        superseded: Option<BlindPosition>,
    },
    Rejected(DecodeError),
    TopicIgnored,
    Logged,
}

/// Dispatches transport events for the control topic tree
#[derive(Debug, Clone)]
pub struct ConnectionEventHandler {
    topic: ControlTopic,
    decoder: PayloadDecoder,
    handoff: Arc<PositionHandoff>,
    metrics: &'static IngressMetrics,
}

impl ConnectionEventHandler {
    pub fn new(topic: ControlTopic, decoder: PayloadDecoder, handoff: Arc<PositionHandoff>) -> Self {
        Self {
            topic,
            decoder,
            handoff,
            metrics: metrics(),
        }
    }

    /// Record into `metrics` instead of the process-wide collector
    pub fn with_metrics(mut self, metrics: &'static IngressMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn topic(&self) -> &ControlTopic {
        &self.topic
    }

    pub fn handoff(&self) -> &Arc<PositionHandoff> {
        &self.handoff
    }

    pub fn handle(&self, event: ControlEvent, subscriber: &dyn SubscribeRequester) -> HandlerOutcome {
        match event {
            ControlEvent::Connected => {
                info!("MQTT connected");
                self.metrics.mqtt_connection_established();
                self.request_subscription(subscriber)
            }
            ControlEvent::Disconnected => {
                info!("MQTT disconnected");
                self.metrics.mqtt_connection_lost();
                HandlerOutcome::Logged
            }
            ControlEvent::Subscribed { packet_id } => {
                info!(packet_id, "MQTT subscription acknowledged");
                HandlerOutcome::Logged
            }
            ControlEvent::Unsubscribed { packet_id } => {
                info!(packet_id, "MQTT unsubscription acknowledged");
                HandlerOutcome::Logged
            }
            ControlEvent::Published { packet_id } => {
                info!(packet_id, "MQTT publish acknowledged");
                HandlerOutcome::Logged
            }
            ControlEvent::Data(message) => self.handle_data(&message),
            ControlEvent::Error(reason) => {
                warn!(reason = %reason, "MQTT transport error");
                self.metrics.mqtt_transport_error();
                HandlerOutcome::Logged
            }
            ControlEvent::Unrecognized(kind) => {
                info!(kind = %kind, "Unhandled MQTT event");
                self.metrics.unrecognized_event();
                HandlerOutcome::Logged
            }
        }
    }

    fn request_subscription(&self, subscriber: &dyn SubscribeRequester) -> HandlerOutcome {
        let filter = self.topic.subscription_filter();
        self.metrics.subscribe_requested();

        match subscriber.request_subscribe(&filter) {
            Ok(()) => {
                info!(filter = %filter, "Subscribe request sent");
                HandlerOutcome::SubscribeRequested { filter }
            }
            Err(e) => {
                warn!(filter = %filter, error = %e, "Subscribe request failed");
                self.metrics.subscribe_failed();
                HandlerOutcome::SubscribeRequestFailed { filter }
            }
        }
    }

    fn handle_data(&self, message: &ControlMessage) -> HandlerOutcome {
        let span = crate::ingress_span!(event = "data", topic = %message.topic_lossy());
        let _guard = span.enter();

        self.metrics.message_received();
        debug!(payload_len = message.payload.len(), "MQTT data received");

        if !self.topic.matches(&message.topic) {
            debug!("Topic outside control root, ignoring");
            self.metrics.message_ignored();
            return HandlerOutcome::TopicIgnored;
        }

        match self.decoder.decode(&message.payload) {
            Ok(position) => {
                let superseded = self.handoff.write(position);
                self.metrics.position_stored(position, superseded.is_some());
                info!(
                    position = position.percent(),
                    superseded = ?superseded.map(BlindPosition::percent),
                    "Target position handed to motor control"
                );
                HandlerOutcome::PositionStored {
                    position,
                    superseded,
                }
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    "Rejected control payload"
                );
                self.metrics.decode_failed(&e);
                HandlerOutcome::Rejected(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSubscriber;

    fn test_metrics() -> &'static IngressMetrics {
        Box::leak(Box::new(IngressMetrics::new()))
    }

    fn handler() -> (ConnectionEventHandler, &'static IngressMetrics) {
        let metrics = test_metrics();
        let handler = ConnectionEventHandler::new(
            ControlTopic::default(),
            PayloadDecoder::default(),
            Arc::new(PositionHandoff::new()),
        )
        .with_metrics(metrics);
        (handler, metrics)
    }

    fn data(topic: &'static str, payload: &'static str) -> ControlEvent {
        ControlEvent::Data(ControlMessage::new(topic, payload))
    }

    #[test]
    fn test_connected_requests_wildcard_subscription() {
        let (handler, metrics) = handler();
        let subscriber = MockSubscriber::new();

        let outcome = handler.handle(ControlEvent::Connected, &subscriber);

        assert_eq!(
            outcome,
            HandlerOutcome::SubscribeRequested {
                filter: "blindcontrol/#".to_string()
            }
        );
        assert_eq!(subscriber.requested_filters(), vec!["blindcontrol/#"]);
        assert!(metrics.is_connected());
    }

    #[test]
    fn test_failed_subscribe_request_is_absorbed() {
        let (handler, metrics) = handler();
        let subscriber = MockSubscriber::with_failure();

        let outcome = handler.handle(ControlEvent::Connected, &subscriber);

        assert!(matches!(outcome, HandlerOutcome::SubscribeRequestFailed { .. }));
        assert_eq!(metrics.snapshot().mqtt.subscribe_failures, 1);
    }

    #[test]
    fn test_data_on_control_topic_is_handed_off() {
        let (handler, metrics) = handler();
        let subscriber = MockSubscriber::new();

        let outcome = handler.handle(data("blindcontrol/livingroom", r#"{"value": 30}"#), &subscriber);

        let expected = BlindPosition::new(30).unwrap();
        assert_eq!(
            outcome,
            HandlerOutcome::PositionStored {
                position: expected,
                superseded: None
            }
        );
        assert_eq!(handler.handoff().read(), Some(expected));
        assert_eq!(metrics.snapshot().control.positions_stored, 1);
    }

    #[test]
    fn test_bare_root_topic_is_processed() {
        let (handler, _) = handler();
        let outcome = handler.handle(data("blindcontrol", r#"{"value": 1}"#), &MockSubscriber::new());
        assert!(matches!(outcome, HandlerOutcome::PositionStored { .. }));
    }

    #[test]
    fn test_foreign_topic_is_ignored_without_decoding() {
        let (handler, metrics) = handler();

        // Payload would fail to decode; an ignored topic must not reach the decoder
        let outcome = handler.handle(data("otherroot/x", "not json"), &MockSubscriber::new());

        assert_eq!(outcome, HandlerOutcome::TopicIgnored);
        assert!(handler.handoff().is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.control.messages_ignored, 1);
        assert_eq!(snapshot.control.decode_failures.total(), 0);
    }

    #[test]
    fn test_second_write_supersedes_unread_position() {
        let (handler, _) = handler();
        let subscriber = MockSubscriber::new();

        handler.handle(data("blindcontrol", r#"{"value": 30}"#), &subscriber);
        let outcome = handler.handle(data("blindcontrol", r#"{"value": 70}"#), &subscriber);

        assert_eq!(
            outcome,
            HandlerOutcome::PositionStored {
                position: BlindPosition::new(70).unwrap(),
                superseded: BlindPosition::new(30),
            }
        );
        assert_eq!(handler.handoff().read(), BlindPosition::new(70));
        assert_eq!(handler.handoff().read(), None);
    }

    #[test]
    fn test_rejected_payload_leaves_slot_untouched() {
        let (handler, metrics) = handler();
        let subscriber = MockSubscriber::new();
        handler.handle(data("blindcontrol", r#"{"value": 20}"#), &subscriber);

        let outcome = handler.handle(data("blindcontrol", r#"{"value": 255}"#), &subscriber);

        assert_eq!(outcome, HandlerOutcome::Rejected(DecodeError::OutOfRange { value: 255 }));
        assert_eq!(handler.handoff().peek(), BlindPosition::new(20));
        assert_eq!(metrics.snapshot().control.decode_failures.out_of_range, 1);
    }

    #[test]
    fn test_acknowledgements_are_logged_only() {
        let (handler, _) = handler();
        let subscriber = MockSubscriber::new();

        for event in [
            ControlEvent::Subscribed { packet_id: 1 },
            ControlEvent::Unsubscribed { packet_id: 2 },
            ControlEvent::Published { packet_id: 3 },
        ] {
            assert_eq!(handler.handle(event, &subscriber), HandlerOutcome::Logged);
        }
        assert!(subscriber.requested_filters().is_empty());
        assert!(handler.handoff().is_empty());
    }

    #[test]
    fn test_disconnect_error_and_unknown_are_logged_only() {
        let (handler, metrics) = handler();
        let subscriber = MockSubscriber::new();

        handler.handle(ControlEvent::Connected, &subscriber);
        assert_eq!(handler.handle(ControlEvent::Disconnected, &subscriber), HandlerOutcome::Logged);
        assert_eq!(
            handler.handle(ControlEvent::Error("connection reset".into()), &subscriber),
            HandlerOutcome::Logged
        );
        assert_eq!(
            handler.handle(ControlEvent::Unrecognized("PubRec".into()), &subscriber),
            HandlerOutcome::Logged
        );

        let snapshot = metrics.snapshot();
        assert!(!snapshot.mqtt.connected);
        assert_eq!(snapshot.mqtt.connections_lost, 1);
        assert_eq!(snapshot.mqtt.transport_errors, 1);
        assert_eq!(snapshot.mqtt.unrecognized_events, 1);
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(ControlEvent::Connected.kind(), "connected");
        assert_eq!(data("a", "b").kind(), "data");
        assert_eq!(ControlEvent::Unrecognized("x".into()).kind(), "unrecognized");
    }
}
