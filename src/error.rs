//! Error types for the chat server
//!
//! Defines connection-level errors, room operation errors and
//! outlet delivery errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::Pin;

/// Connection-level errors
///
/// Any of these terminates the connection they occur on.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Room operation errors
///
/// Reported to the requesting connection only. Returning one of these
/// never leaves shared state modified. The display text is what clients
/// see in `join_error.message` / `error.message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// No live room with the given pin
    #[error("room not found")]
    RoomNotFound(Pin),

    /// Room already holds `max_participants` members
    #[error("room full")]
    RoomFull,

    /// Session already belongs to a room
    #[error("already in a room")]
    AlreadyInRoom(Pin),

    /// Requested capacity outside the allowed range
    #[error("max participants must be between 2 and 10, got {0}")]
    InvalidCapacity(usize),

    /// Every pin is taken
    #[error("no free room pins left")]
    AllocatorExhausted,
}

/// Outlet delivery errors
///
/// Occurs when pushing an event to a connection that cannot take it.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound buffer is full
    #[error("Channel full")]
    ChannelFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_error_messages() {
        assert_eq!(RoomError::RoomFull.to_string(), "room full");
        assert_eq!(
            RoomError::RoomNotFound(Pin::from_number(1)).to_string(),
            "room not found"
        );
        assert_eq!(
            RoomError::InvalidCapacity(11).to_string(),
            "max participants must be between 2 and 10, got 11"
        );
    }
}
