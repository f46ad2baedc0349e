//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Event names are
//! snake_case in the `type` field; payload fields are camelCase.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::RoomError;
use crate::pin::PIN_SPACE;
use crate::room::{ChatMessage, RoomSummary};
use crate::types::Pin;

/// Client → Server message
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new room and join it
    CreateRoom {
        #[serde(rename = "maxParticipants")]
        max_participants: usize,
        #[serde(rename = "roomNumber", default, deserialize_with = "label_from_any")]
        room_number: Option<String>,
        nickname: String,
    },
    /// Join an existing room by pin
    JoinRoom {
        #[serde(deserialize_with = "pin_from_any")]
        pin: String,
        nickname: String,
    },
    /// Leave the current room
    LeaveRoom,
    /// Send a chat message to the current room
    SendMessage {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        author: String,
        content: String,
    },
    /// Ask for the rooms that have a free seat
    GetAvailableRooms,
    /// Ask for the participants of the current room
    GetRoomParticipants,
}

/// Accept a room number given as either a JSON string or a number
fn label_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept a pin given as either a JSON string or a number
///
/// Numbers inside the pin space are zero-padded to six digits, so `42`
/// names the room `"000042"`. Anything else is kept verbatim and fails the
/// lookup as an unknown pin.
fn pin_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(match n.as_u64() {
            Some(v) if v < u64::from(PIN_SPACE) => Pin::from_number(v as u32).to_string(),
            _ => n.to_string(),
        }),
        other => Err(de::Error::invalid_type(
            de::Unexpected::Other(&other.to_string()),
            &"a pin string or number",
        )),
    }
}

/// Server → Client message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once right after the handshake
    HostInfo { host: String, ip: String },
    /// Room created, sent to the creator
    RoomCreated(RoomSummary),
    /// Full message log, sent to a new joiner
    RoomHistory { messages: Vec<ChatMessage> },
    /// Nicknames of the room's members in join order
    RoomParticipants { participants: Vec<String> },
    /// Someone joined the room
    UserJoined { nickname: String, pin: Pin },
    /// Someone left the room
    UserLeft { nickname: String, pin: Pin },
    /// Chat message relayed to the room
    ReceiveMessage(ChatMessage),
    /// Rooms with a free seat
    AvailableRooms { rooms: Vec<RoomSummary> },
    /// Join refused
    JoinError { code: ErrorCode, message: String },
    /// Any other refused request
    Error { code: ErrorCode, message: String },
}

/// Error codes for `join_error` and `error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Non-existent room pin
    RoomNotFound,
    /// Room is at capacity
    RoomFull,
    /// Already in a room
    AlreadyInRoom,
    /// maxParticipants outside 2..=10
    InvalidCapacity,
    /// No pin could be allocated
    AllocatorExhausted,
    /// Invalid message format
    InvalidMessage,
}

impl From<&RoomError> for ErrorCode {
    fn from(err: &RoomError) -> Self {
        match err {
            RoomError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            RoomError::RoomFull => ErrorCode::RoomFull,
            RoomError::AlreadyInRoom(_) => ErrorCode::AlreadyInRoom,
            RoomError::InvalidCapacity(_) => ErrorCode::InvalidCapacity,
            RoomError::AllocatorExhausted => ErrorCode::AllocatorExhausted,
        }
    }
}

impl ServerMessage {
    /// Join refusal for the requester
    pub fn join_error(err: &RoomError) -> Self {
        ServerMessage::JoinError {
            code: err.into(),
            message: err.to_string(),
        }
    }

    /// General refusal for the requester
    pub fn error(err: &RoomError) -> Self {
        ServerMessage::Error {
            code: err.into(),
            message: err.to_string(),
        }
    }

    /// Refusal of a frame that could not be parsed
    pub fn invalid_message(reason: &str) -> Self {
        ServerMessage::Error {
            code: ErrorCode::InvalidMessage,
            message: format!("Invalid message format: {}", reason),
        }
    }
}
