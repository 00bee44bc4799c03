//! Pure routing of MQTT events into control events

use crate::ingress::{ControlEvent, ControlMessage};
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::Event;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Map a transport event onto a [`ControlEvent`] (pure function).
    ///
    /// Keep-alive traffic and outgoing packets return `None`; they are
    /// transport housekeeping with no meaning for the ingress path.
    pub fn route_mqtt_event(event: &Event) -> Option<ControlEvent> {
        match event {
            Event::Incoming(packet) => Self::route_incoming(packet),
            Event::Outgoing(_) => None,
        }
    }

    fn route_incoming(packet: &Packet) -> Option<ControlEvent> {
        let event = match packet {
            Packet::ConnAck(connack) if connack.code == ConnectReturnCode::Success => {
                ControlEvent::Connected
            }
            Packet::ConnAck(connack) => {
                ControlEvent::Error(format!("Connection refused: {:?}", connack.code))
            }
            Packet::Disconnect(_) => ControlEvent::Disconnected,
            Packet::SubAck(suback) => ControlEvent::Subscribed {
                packet_id: suback.pkid,
            },
            Packet::UnsubAck(unsuback) => ControlEvent::Unsubscribed {
                packet_id: unsuback.pkid,
            },
            Packet::PubAck(puback) => ControlEvent::Published {
                packet_id: puback.pkid,
            },
            Packet::PubComp(pubcomp) => ControlEvent::Published {
                packet_id: pubcomp.pkid,
            },
            Packet::Publish(publish) => ControlEvent::Data(ControlMessage::new(
                publish.topic.clone(),
                publish.payload.clone(),
            )),
            // Keep-alive traffic
            Packet::PingReq(_) | Packet::PingResp(_) => return None,
            other => ControlEvent::Unrecognized(Self::packet_kind(other).to_string()),
        };
        Some(event)
    }

    /// Packet type name for packets the ingress path does not handle
    fn packet_kind(packet: &Packet) -> &'static str {
        match packet {
            Packet::Connect(..) => "Connect",
            Packet::ConnAck(_) => "ConnAck",
            Packet::Publish(_) => "Publish",
            Packet::PubAck(_) => "PubAck",
            Packet::PingReq(_) => "PingReq",
            Packet::PingResp(_) => "PingResp",
            Packet::Subscribe(_) => "Subscribe",
            Packet::SubAck(_) => "SubAck",
            Packet::PubRec(_) => "PubRec",
            Packet::PubRel(_) => "PubRel",
            Packet::PubComp(_) => "PubComp",
            Packet::Unsubscribe(_) => "Unsubscribe",
            Packet::UnsubAck(_) => "UnsubAck",
            Packet::Disconnect(_) => "Disconnect",
        }
    }
}
