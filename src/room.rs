//! Room struct definition
//!
//! Represents a bounded chat room: ordered participants plus an
//! append-only message log that lives as long as the room.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::RoomError;
use crate::types::{ConnectionId, Pin};

/// Label used when the creator gives no room number
pub const UNNUMBERED_LABEL: &str = "unnumbered";

/// Smallest allowed room capacity
pub const MIN_PARTICIPANTS: usize = 2;

/// Largest allowed room capacity
pub const MAX_PARTICIPANTS: usize = 10;

/// Check a requested capacity against the allowed range
pub fn validate_capacity(max_participants: usize) -> Result<usize, RoomError> {
    if (MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&max_participants) {
        Ok(max_participants)
    } else {
        Err(RoomError::InvalidCapacity(max_participants))
    }
}

/// A chat message as stored in the room log and relayed to members
///
/// `id` is generated by the client and used to drop redeliveries.
/// Messages without one are always appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub author: String,
    pub content: String,
}

/// Public view of a room, used by `room_created` and `available_rooms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub pin: Pin,
    pub room_number: String,
    pub current_participants: usize,
    pub max_participants: usize,
}

/// Chat room
///
/// Participants are kept in join order. Their count never exceeds
/// `max_participants`.
#[derive(Debug)]
pub struct Room {
    pin: Pin,
    label: String,
    max_participants: usize,
    participants: Vec<(ConnectionId, String)>,
    messages: Vec<ChatMessage>,
    seen_ids: HashSet<String>,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create a new room with the creator as its only participant
    pub fn new(
        pin: Pin,
        label: Option<String>,
        max_participants: usize,
        creator: ConnectionId,
        creator_nickname: String,
    ) -> Self {
        let label = label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| UNNUMBERED_LABEL.to_string());

        Self {
            pin,
            label,
            max_participants,
            participants: vec![(creator, creator_nickname)],
            messages: Vec::new(),
            seen_ids: HashSet::new(),
            created_at: Instant::now(),
        }
    }

    pub fn pin(&self) -> &Pin {
        &self.pin
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Check if room is at capacity
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants
    }

    /// Check if room has no participants left
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Check if a connection is in this room
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.participants.iter().any(|(id, _)| *id == connection_id)
    }

    /// Add a participant
    ///
    /// Returns false if the room is full. A connection that is already a
    /// member keeps its position and gets the new nickname.
    pub fn add_participant(&mut self, connection_id: ConnectionId, nickname: String) -> bool {
        if self.is_full() {
            return false;
        }

        match self.participants.iter_mut().find(|(id, _)| *id == connection_id) {
            Some(entry) => entry.1 = nickname,
            None => self.participants.push((connection_id, nickname)),
        }
        true
    }

    /// Remove a participant, returning their nickname if they were present
    pub fn remove_participant(&mut self, connection_id: ConnectionId) -> Option<String> {
        let index = self
            .participants
            .iter()
            .position(|(id, _)| *id == connection_id)?;
        Some(self.participants.remove(index).1)
    }

    /// Nicknames in join order
    pub fn nicknames(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|(_, nickname)| nickname.clone())
            .collect()
    }

    /// Append a message to the log
    ///
    /// Returns false (and leaves the log alone) if a message with the same
    /// id was appended before.
    pub fn append_message(&mut self, message: ChatMessage) -> bool {
        if let Some(id) = &message.id {
            if !self.seen_ids.insert(id.clone()) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    /// Full message history in send order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            pin: self.pin.clone(),
            room_number: self.label.clone(),
            current_participants: self.participants.len(),
            max_participants: self.max_participants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: Option<&str>, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.map(str::to_string),
            author: "alice".to_string(),
            content: content.to_string(),
        }
    }

    fn room(max: usize) -> (Room, ConnectionId) {
        let creator = ConnectionId::new();
        let room = Room::new(
            Pin::from_number(123456),
            Some("7".to_string()),
            max,
            creator,
            "alice".to_string(),
        );
        (room, creator)
    }

    #[test]
    fn test_room_creation() {
        let (room, creator) = room(4);

        assert_eq!(room.pin().as_str(), "123456");
        assert_eq!(room.label(), "7");
        assert!(room.contains(creator));
        assert!(!room.is_full());
        assert!(!room.is_empty());
        assert_eq!(room.participant_count(), 1);
        assert_eq!(room.nicknames(), vec!["alice"]);
    }

    #[test]
    fn test_room_default_label() {
        let room = Room::new(
            Pin::from_number(1),
            None,
            2,
            ConnectionId::new(),
            "alice".to_string(),
        );
        assert_eq!(room.label(), UNNUMBERED_LABEL);

        let blank = Room::new(
            Pin::from_number(2),
            Some("  ".to_string()),
            2,
            ConnectionId::new(),
            "alice".to_string(),
        );
        assert_eq!(blank.label(), UNNUMBERED_LABEL);
    }

    #[test]
    fn test_room_capacity() {
        let (mut room, _) = room(2);

        assert!(room.add_participant(ConnectionId::new(), "bob".to_string()));
        assert!(room.is_full());

        // Cannot add another participant
        assert!(!room.add_participant(ConnectionId::new(), "carol".to_string()));
        assert_eq!(room.participant_count(), 2);
        assert_eq!(room.nicknames(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_room_rejoin_same_connection_updates_nickname() {
        let (mut room, creator) = room(3);
        room.add_participant(ConnectionId::new(), "bob".to_string());

        assert!(room.add_participant(creator, "alicia".to_string()));
        assert_eq!(room.participant_count(), 2);
        assert_eq!(room.nicknames(), vec!["alicia", "bob"]);
    }

    #[test]
    fn test_room_remove_keeps_order() {
        let (mut room, creator) = room(4);
        let bob = ConnectionId::new();
        room.add_participant(bob, "bob".to_string());
        room.add_participant(ConnectionId::new(), "carol".to_string());

        assert_eq!(room.remove_participant(bob), Some("bob".to_string()));
        assert_eq!(room.nicknames(), vec!["alice", "carol"]);

        // Unknown connection is a no-op
        assert_eq!(room.remove_participant(ConnectionId::new()), None);

        room.remove_participant(creator);
        assert_eq!(room.nicknames(), vec!["carol"]);
    }

    #[test]
    fn test_room_last_participant_leaves() {
        let (mut room, creator) = room(2);
        room.remove_participant(creator);
        assert!(room.is_empty());
    }

    #[test]
    fn test_message_dedup_by_id() {
        let (mut room, _) = room(2);

        assert!(room.append_message(message(Some("m1"), "hello")));
        assert!(!room.append_message(message(Some("m1"), "hello again")));
        assert!(room.append_message(message(Some("m2"), "second")));

        assert_eq!(room.messages().len(), 2);
        assert_eq!(room.messages()[0].content, "hello");
    }

    #[test]
    fn test_message_without_id_always_appended() {
        let (mut room, _) = room(2);

        assert!(room.append_message(message(None, "same")));
        assert!(room.append_message(message(None, "same")));
        assert_eq!(room.messages().len(), 2);
    }

    #[test]
    fn test_validate_capacity() {
        assert_eq!(validate_capacity(2), Ok(2));
        assert_eq!(validate_capacity(10), Ok(10));
        assert_eq!(validate_capacity(1), Err(RoomError::InvalidCapacity(1)));
        assert_eq!(validate_capacity(11), Err(RoomError::InvalidCapacity(11)));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let (room, _) = room(5);
        let json = serde_json::to_value(room.summary()).unwrap();

        assert_eq!(json["pin"], "123456");
        assert_eq!(json["roomNumber"], "7");
        assert_eq!(json["currentParticipants"], 1);
        assert_eq!(json["maxParticipants"], 5);
    }
}
