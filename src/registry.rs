//! Room registry
//!
//! Owns every live room, keyed by pin. All room mutations go through the
//! narrow operation set here; the map itself is never handed out.

use std::collections::HashMap;

use tracing::debug;

use crate::error::RoomError;
use crate::pin::PinAllocator;
use crate::room::{ChatMessage, Room, RoomSummary};
use crate::types::{ConnectionId, Pin};

/// All live rooms: Pin -> Room
///
/// Does not stop a connection from being a member of several rooms;
/// that rule belongs to the caller.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<Pin, Room>,
    allocator: PinAllocator,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_allocator(PinAllocator::new())
    }

    pub fn with_allocator(allocator: PinAllocator) -> Self {
        Self {
            rooms: HashMap::new(),
            allocator,
        }
    }

    /// Create a room with the creator as sole participant
    ///
    /// The pin is allocated and inserted under the same `&mut self` borrow,
    /// so it cannot be handed out twice.
    pub fn create_room(
        &mut self,
        label: Option<String>,
        max_participants: usize,
        creator: ConnectionId,
        creator_nickname: String,
    ) -> Result<&Room, RoomError> {
        let pin = self.allocator.allocate(&self.rooms)?;
        let room = Room::new(pin.clone(), label, max_participants, creator, creator_nickname);

        debug!("Room {} allocated ({} live)", pin, self.rooms.len() + 1);
        Ok(self.rooms.entry(pin).or_insert(room))
    }

    /// Add a participant to an existing room
    ///
    /// Fails without touching any room if the pin is unknown or the room is
    /// at capacity.
    pub fn join_room(
        &mut self,
        pin: &Pin,
        connection_id: ConnectionId,
        nickname: String,
    ) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(pin)
            .ok_or_else(|| RoomError::RoomNotFound(pin.clone()))?;

        if !room.add_participant(connection_id, nickname) {
            return Err(RoomError::RoomFull);
        }

        Ok(room)
    }

    /// Remove a participant; `None` if the pin is unknown
    pub fn leave(&mut self, pin: &Pin, connection_id: ConnectionId) -> Option<&Room> {
        let room = self.rooms.get_mut(pin)?;
        room.remove_participant(connection_id);
        Some(room)
    }

    /// Destroy a room along with its message history
    pub fn remove(&mut self, pin: &Pin) -> Option<Room> {
        self.rooms.remove(pin)
    }

    pub fn get(&self, pin: &Pin) -> Option<&Room> {
        self.rooms.get(pin)
    }

    /// Append to a room's log
    ///
    /// `Ok(false)` means the message id was already seen in this room.
    pub fn append_message(&mut self, pin: &Pin, message: ChatMessage) -> Result<bool, RoomError> {
        let room = self
            .rooms
            .get_mut(pin)
            .ok_or_else(|| RoomError::RoomNotFound(pin.clone()))?;
        Ok(room.append_message(message))
    }

    /// Rooms that still have a free seat, in no particular order
    pub fn snapshot_available(&self) -> Vec<RoomSummary> {
        self.rooms
            .values()
            .filter(|room| !room.is_full())
            .map(Room::summary)
            .collect()
    }

    /// Nicknames of a room's participants in join order
    pub fn participants_display_list(&self, pin: &Pin) -> Vec<String> {
        self.rooms.get(pin).map(Room::nicknames).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
