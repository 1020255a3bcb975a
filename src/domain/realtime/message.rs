//! The realtime message envelope.
//!
//! Every application-level frame exchanged with a browser is a JSON object:
//!
//! ```text
//! {"type": "post:created", "payload": {...}, "timestamp": "2025-01-10T00:00:00Z"}
//! ```
//!
//! The `type` tag is a closed enumeration. Each server-originated type has
//! exactly one statically-typed payload struct, bound to it through
//! [`EventPayload`]; the envelope itself stores the payload already
//! serialized and performs no validation.

use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::{TenantId, Timestamp, UserId};

use super::payloads::ConnectedPayload;

/// Tag identifying the kind of a realtime message.
///
/// Server → client: `connected`, `pong`, `notification:new`,
/// `post:created|updated|deleted`, `comment:created|deleted`, `like:updated`.
/// Client → server: `ping`. Any other tag received from a client decodes
/// to [`MessageType::Unknown`] and is ignored rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Connected,
    Ping,
    Pong,
    NotificationNew,
    PostCreated,
    PostUpdated,
    PostDeleted,
    CommentCreated,
    CommentDeleted,
    LikeUpdated,
    Unknown(String),
}

impl MessageType {
    /// Wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Connected => "connected",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::NotificationNew => "notification:new",
            MessageType::PostCreated => "post:created",
            MessageType::PostUpdated => "post:updated",
            MessageType::PostDeleted => "post:deleted",
            MessageType::CommentCreated => "comment:created",
            MessageType::CommentDeleted => "comment:deleted",
            MessageType::LikeUpdated => "like:updated",
            MessageType::Unknown(tag) => tag,
        }
    }

    /// Parses a wire name. Never fails: unrecognised tags are preserved
    /// as `Unknown`.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "connected" => MessageType::Connected,
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            "notification:new" => MessageType::NotificationNew,
            "post:created" => MessageType::PostCreated,
            "post:updated" => MessageType::PostUpdated,
            "post:deleted" => MessageType::PostDeleted,
            "comment:created" => MessageType::CommentCreated,
            "comment:deleted" => MessageType::CommentDeleted,
            "like:updated" => MessageType::LikeUpdated,
            other => MessageType::Unknown(other.to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MessageType::Unknown(_))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(MessageType::parse(&tag))
    }
}

/// A payload struct statically bound to one message type.
pub trait EventPayload: Serialize {
    const KIND: MessageType;
}

/// Errors building or decoding a message.
#[derive(Debug, Error)]
pub enum MessageError {
    /// A payload could not be serialized. For the payload types defined in
    /// this crate this indicates a programming error in the producer.
    #[error("failed to serialize {kind} payload: {source}")]
    Serialization {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },

    /// An inbound frame or a payload did not have the expected shape.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Immutable realtime message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: MessageType,

    #[serde(default)]
    payload: serde_json::Value,

    /// Clients are not required to stamp their own frames.
    #[serde(default = "Timestamp::now")]
    timestamp: Timestamp,
}

impl Message {
    /// Builds a message from a type and any serializable payload, stamped
    /// with the current time.
    pub fn new<P: Serialize>(kind: MessageType, payload: &P) -> Result<Self, MessageError> {
        let payload = serde_json::to_value(payload).map_err(|source| {
            MessageError::Serialization {
                kind: kind.clone(),
                source,
            }
        })?;

        Ok(Self {
            kind,
            payload,
            timestamp: Timestamp::now(),
        })
    }

    /// Builds a message whose type is determined by the payload struct.
    pub fn from_payload<P: EventPayload>(payload: &P) -> Result<Self, MessageError> {
        Self::new(P::KIND, payload)
    }

    /// Application-level heartbeat reply. Carries a `null` payload.
    pub fn pong() -> Self {
        Self::without_payload(MessageType::Pong)
    }

    /// Application-level heartbeat request.
    pub fn ping() -> Self {
        Self::without_payload(MessageType::Ping)
    }

    /// Connection confirmation sent right after a client is registered.
    pub fn connected(tenant_id: TenantId, user_id: UserId) -> Result<Self, MessageError> {
        Self::from_payload(&ConnectedPayload::new(tenant_id, user_id))
    }

    fn without_payload(kind: MessageType) -> Self {
        Self {
            kind,
            payload: serde_json::Value::Null,
            timestamp: Timestamp::now(),
        }
    }

    pub fn kind(&self) -> &MessageType {
        &self.kind
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Decodes the opaque payload into a typed structure.
    pub fn decode_payload<P: DeserializeOwned>(&self) -> Result<P, MessageError> {
        P::deserialize(&self.payload).map_err(MessageError::Decode)
    }

    /// Encodes the envelope as a JSON text frame.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|source| MessageError::Serialization {
            kind: self.kind.clone(),
            source,
        })
    }

    /// Decodes a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(MessageError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::realtime::payloads::{LikeTarget, LikeUpdatedPayload, PostCreatedPayload};
    use uuid::Uuid;

    #[test]
    fn message_type_wire_names_round_trip() {
        for kind in [
            MessageType::Connected,
            MessageType::Ping,
            MessageType::Pong,
            MessageType::NotificationNew,
            MessageType::PostCreated,
            MessageType::PostUpdated,
            MessageType::PostDeleted,
            MessageType::CommentCreated,
            MessageType::CommentDeleted,
            MessageType::LikeUpdated,
        ] {
            assert_eq!(MessageType::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_type_is_preserved_not_rejected() {
        let msg = Message::from_json(r#"{"type":"typing:start","payload":{"x":1}}"#).unwrap();
        assert_eq!(msg.kind(), &MessageType::Unknown("typing:start".to_string()));
        assert!(msg.kind().is_unknown());
    }

    #[test]
    fn client_ping_without_payload_or_timestamp_decodes() {
        let msg = Message::from_json(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind(), &MessageType::Ping);
        assert!(msg.payload().is_null());
    }

    #[test]
    fn malformed_frame_is_a_decode_error() {
        let err = Message::from_json("not json").unwrap_err();
        assert!(matches!(err, MessageError::Decode(_)));
    }

    #[test]
    fn envelope_serializes_with_type_payload_and_timestamp() {
        let payload = LikeUpdatedPayload {
            target_type: LikeTarget::Post,
            target_id: Uuid::nil(),
            like_count: 3,
        };
        let msg = Message::from_payload(&payload).unwrap();
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "like:updated");
        assert_eq!(json["payload"]["target_type"], "post");
        assert_eq!(json["payload"]["like_count"], 3);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn pong_has_null_payload() {
        let json: serde_json::Value =
            serde_json::from_str(&Message::pong().to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "pong");
        assert!(json["payload"].is_null());
    }

    #[test]
    fn message_survives_the_wire_with_type_and_payload_intact() {
        let payload = PostCreatedPayload {
            id: Uuid::new_v4(),
            title: "Hello".to_string(),
            author_id: UserId::new(),
            author_name: "Ada".to_string(),
            category_id: None,
            created_at: Timestamp::now(),
        };
        let sent = Message::from_payload(&payload).unwrap();

        let received = Message::from_json(&sent.to_json().unwrap()).unwrap();

        assert_eq!(received.kind(), &MessageType::PostCreated);
        assert_eq!(received.payload(), sent.payload());
        assert_eq!(received.timestamp(), sent.timestamp());
        let decoded: PostCreatedPayload = received.decode_payload().unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn decode_payload_reports_shape_mismatch() {
        let msg = Message::pong();
        let result = msg.decode_payload::<PostCreatedPayload>();
        assert!(matches!(result, Err(MessageError::Decode(_))));
    }

    #[test]
    fn unserializable_payload_is_reported() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("boom"))
            }
        }

        let err = Message::new(MessageType::PostCreated, &Broken).unwrap_err();
        assert!(matches!(
            err,
            MessageError::Serialization { kind: MessageType::PostCreated, .. }
        ));
    }
}
