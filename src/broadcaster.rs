//! Event fan-out
//!
//! Holds the outbound channel of every connection. Delivery never waits:
//! a connection whose buffer is full is cut off instead, so it can never
//! keep a room membership while silently missing events.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::session::SessionTable;
use crate::types::{ConnectionId, Pin};

/// Server → Client channels: ConnectionId -> Sender
#[derive(Debug, Default)]
pub struct Broadcaster {
    outlets: HashMap<ConnectionId, mpsc::Sender<ServerMessage>>,
    /// Connections cut off for falling behind, not yet disconnected
    lagging: Vec<ConnectionId>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        self.outlets.insert(connection_id, sender);
    }

    pub fn unregister(&mut self, connection_id: ConnectionId) {
        self.outlets.remove(&connection_id);
    }

    /// Send to a single connection
    ///
    /// On `ChannelFull` the outlet is dropped, which makes the connection's
    /// write task close the socket, and the connection is queued for
    /// [`Broadcaster::take_lagging`].
    pub fn to_connection(
        &mut self,
        connection_id: ConnectionId,
        msg: ServerMessage,
    ) -> Result<(), SendError> {
        let Some(sender) = self.outlets.get(&connection_id) else {
            return Err(SendError::ChannelClosed);
        };

        match sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Connection {} fell behind, cutting it off", connection_id);
                self.outlets.remove(&connection_id);
                self.lagging.push(connection_id);
                Err(SendError::ChannelFull)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    /// Send to every connection whose session is in `pin`
    ///
    /// Returns how many connections accepted the event.
    pub fn to_room(&mut self, sessions: &SessionTable, pin: &Pin, msg: ServerMessage) -> usize {
        let targets: Vec<_> = sessions.members_of(pin).collect();
        self.deliver(targets, msg)
    }

    /// Send to every registered connection
    pub fn to_all(&mut self, msg: ServerMessage) -> usize {
        let targets: Vec<_> = self.outlets.keys().copied().collect();
        self.deliver(targets, msg)
    }

    fn deliver(&mut self, targets: Vec<ConnectionId>, msg: ServerMessage) -> usize {
        let mut delivered = 0;
        for connection_id in targets {
            match self.to_connection(connection_id, msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Skipping delivery to {}: {}", connection_id, e),
            }
        }
        delivered
    }

    /// Connections cut off since the last call
    ///
    /// The caller must run the disconnect path for each of them.
    pub fn take_lagging(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.lagging)
    }

    pub fn len(&self) -> usize {
        self.outlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outlet(
        broadcaster: &mut Broadcaster,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(capacity);
        broadcaster.register(id, tx);
        (id, rx)
    }

    fn participants(names: &[&str]) -> ServerMessage {
        ServerMessage::RoomParticipants {
            participants: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_to_connection() {
        let mut broadcaster = Broadcaster::new();
        let (id, mut rx) = outlet(&mut broadcaster, 8);

        broadcaster.to_connection(id, participants(&["alice"])).unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::RoomParticipants { .. })
        ));
    }

    #[tokio::test]
    async fn test_to_unknown_connection_fails() {
        let mut broadcaster = Broadcaster::new();
        let result = broadcaster.to_connection(ConnectionId::new(), participants(&[]));
        assert!(matches!(result, Err(SendError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_full_outlet_cuts_connection_off() {
        let mut broadcaster = Broadcaster::new();
        let (id, mut rx) = outlet(&mut broadcaster, 1);

        broadcaster.to_connection(id, participants(&[])).unwrap();
        let result = broadcaster.to_connection(id, participants(&[]));
        assert!(matches!(result, Err(SendError::ChannelFull)));

        // Outlet gone: later sends fail and the receiver sees the channel close
        assert!(broadcaster.is_empty());
        assert!(matches!(
            broadcaster.to_connection(id, participants(&[])),
            Err(SendError::ChannelClosed)
        ));
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());

        assert_eq!(broadcaster.take_lagging(), vec![id]);
        assert!(broadcaster.take_lagging().is_empty());
    }

    #[tokio::test]
    async fn test_to_room_only_reaches_members() {
        let mut broadcaster = Broadcaster::new();
        let mut sessions = SessionTable::new();
        let pin = Pin::from_number(5);

        let (member, mut member_rx) = outlet(&mut broadcaster, 8);
        let (outsider, mut outsider_rx) = outlet(&mut broadcaster, 8);
        sessions.register(member);
        sessions.register(outsider);
        sessions.set_room(member, Some(pin.clone()));

        let delivered = broadcaster.to_room(&sessions, &pin, participants(&["alice"]));
        assert_eq!(delivered, 1);
        assert!(member_rx.try_recv().is_ok());
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_to_all_skips_closed_outlets() {
        let mut broadcaster = Broadcaster::new();
        let (_, mut open_rx) = outlet(&mut broadcaster, 8);
        let (_, closed_rx) = outlet(&mut broadcaster, 8);
        drop(closed_rx);

        let delivered = broadcaster.to_all(ServerMessage::AvailableRooms { rooms: vec![] });
        assert_eq!(delivered, 1);
        assert!(open_rx.try_recv().is_ok());
    }
}
