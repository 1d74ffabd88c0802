//! Server message envelope.
//!
//! All traffic on the realtime channel is JSON text frames with the shape:
//!
//! ```json
//! {
//!   "message_type": "Chat",
//!   "room": 42,
//!   "sender": "alice",
//!   "content": "hello"
//! }
//! ```
//!
//! `message_type` and `room` are the closed, typed part of the envelope;
//! everything else is an open payload map so new server fields never break
//! deserialization.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// MessageType
// ============================================================================

/// The closed set of message types the game server emits.
///
/// Serialized as the exact wire strings (`"Chat"`, `"Move"`, ...).
/// A frame carrying any other string fails deserialization and is
/// discarded by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// In-room chat line.
    Chat,
    /// A game move by either player.
    Move,
    /// Matchmaking found an opponent.
    Match,
    /// The game in the room ended.
    End,
    /// A player joined the room.
    Join,
    /// A player left the room.
    Leave,
}

impl MessageType {
    /// All message types, in wire order.
    pub const ALL: [Self; 6] = [
        Self::Chat,
        Self::Move,
        Self::Match,
        Self::End,
        Self::Join,
        Self::Leave,
    ];

    /// Returns the wire string for this type.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Move => "Move",
            Self::Match => "Match",
            Self::End => "End",
            Self::Join => "Join",
            Self::Leave => "Leave",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ServerMessage
// ============================================================================

/// One message exchanged with the game server.
///
/// The known fields are typed; arbitrary extra payload fields are preserved
/// in [`ServerMessage::payload`] via serde flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Discriminant of the message.
    pub message_type: MessageType,

    /// Room the message belongs to.
    pub room: u32,

    /// Open set of additional payload fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ServerMessage {
    /// Creates a message with an empty payload.
    #[inline]
    #[must_use]
    pub fn new(message_type: MessageType, room: u32) -> Self {
        Self {
            message_type,
            room,
            payload: Map::new(),
        }
    }

    /// Adds a payload field, builder style.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Gets a string payload field, if present.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Gets an unsigned integer payload field, if present.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.payload.get(key).and_then(Value::as_u64)
    }

    /// Gets a boolean payload field, if present.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(Value::as_bool)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_strings() {
        for kind in MessageType::ALL {
            let json = serde_json::to_string(&kind).expect("serialize");
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_deserialize_with_extra_fields() {
        let json = r#"{
            "message_type": "Chat",
            "room": 7,
            "sender": "alice",
            "content": "gg"
        }"#;

        let msg: ServerMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(msg.message_type, MessageType::Chat);
        assert_eq!(msg.room, 7);
        assert_eq!(msg.get_str("sender"), Some("alice"));
        assert_eq!(msg.get_str("content"), Some("gg"));
        assert_eq!(msg.get_str("missing"), None);
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let json = r#"{ "message_type": "Teleport", "room": 1 }"#;
        assert!(serde_json::from_str::<ServerMessage>(json).is_err());
    }

    #[test]
    fn test_missing_message_type_rejected() {
        let json = r#"{ "room": 1, "content": "hi" }"#;
        assert!(serde_json::from_str::<ServerMessage>(json).is_err());
    }

    #[test]
    fn test_payload_round_trip() {
        let msg = ServerMessage::new(MessageType::Move, 3)
            .with_field("x", 4)
            .with_field("y", 9);

        let json = serde_json::to_string(&msg).expect("serialize");
        let back: ServerMessage = serde_json::from_str(&json).expect("parse");

        assert_eq!(back, msg);
        assert_eq!(back.get_u64("x"), Some(4));
        assert_eq!(back.get_u64("y"), Some(9));
    }
}
