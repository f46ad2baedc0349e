//! Per-connection session state
//!
//! A session records who a connection claims to be and which room it is
//! currently in. The room pin is a lookup key only; a room may be gone by
//! the time a stale session refers to it.

use std::collections::HashMap;
use std::time::Instant;

use crate::types::{ConnectionId, Pin};

/// Connected client information
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier for this connection
    pub connection_id: ConnectionId,
    /// Nickname (empty until the first create/join)
    pub nickname: String,
    /// Room the connection is currently in
    pub current_room: Option<Pin>,
    /// Connection time
    pub connected_at: Instant,
}

impl Session {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            nickname: String::new(),
            current_room: None,
            connected_at: Instant::now(),
        }
    }

    /// Check if this session is in a room
    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some()
    }
}

/// All live sessions: ConnectionId -> Session
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<ConnectionId, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session for a new connection
    pub fn register(&mut self, connection_id: ConnectionId) -> &Session {
        self.sessions
            .entry(connection_id)
            .or_insert_with(|| Session::new(connection_id))
    }

    /// Set the session's nickname; false if the connection is unknown
    pub fn set_identity(&mut self, connection_id: ConnectionId, nickname: String) -> bool {
        match self.sessions.get_mut(&connection_id) {
            Some(session) => {
                session.nickname = nickname;
                true
            }
            None => false,
        }
    }

    pub fn set_room(&mut self, connection_id: ConnectionId, pin: Option<Pin>) {
        if let Some(session) = self.sessions.get_mut(&connection_id) {
            session.current_room = pin;
        }
    }

    /// Clear the session's room, returning the one it was in
    pub fn take_room(&mut self, connection_id: ConnectionId) -> Option<Pin> {
        self.sessions
            .get_mut(&connection_id)
            .and_then(|session| session.current_room.take())
    }

    /// Drop the session on disconnect
    ///
    /// The caller runs the leave path for the returned session's room.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions.remove(&connection_id)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.sessions.contains_key(&connection_id)
    }

    pub fn current_room(&self, connection_id: ConnectionId) -> Option<&Pin> {
        self.sessions
            .get(&connection_id)
            .and_then(|session| session.current_room.as_ref())
    }

    /// Connections whose current room is `pin`
    pub fn members_of<'a>(&'a self, pin: &'a Pin) -> impl Iterator<Item = ConnectionId> + 'a {
        self.sessions
            .values()
            .filter(move |session| session.current_room.as_ref() == Some(pin))
            .map(|session| session.connection_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_creates_idle_session() {
        let mut table = SessionTable::new();
        let id = ConnectionId::new();
        let session = table.register(id);

        assert_eq!(session.connection_id, id);
        assert!(session.nickname.is_empty());
        assert!(!session.is_in_room());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_set_identity() {
        let mut table = SessionTable::new();
        let id = ConnectionId::new();
        table.register(id);

        assert!(table.set_identity(id, "alice".to_string()));
        assert_eq!(table.get(id).unwrap().nickname, "alice");
        assert!(!table.set_identity(ConnectionId::new(), "ghost".to_string()));
    }

    #[test]
    fn test_set_and_take_room() {
        let mut table = SessionTable::new();
        let id = ConnectionId::new();
        table.register(id);
        let pin = Pin::from_number(123);

        table.set_room(id, Some(pin.clone()));
        assert_eq!(table.current_room(id), Some(&pin));

        assert_eq!(table.take_room(id), Some(pin));
        assert_eq!(table.current_room(id), None);
        assert_eq!(table.take_room(id), None);
    }

    #[test]
    fn test_members_of() {
        let mut table = SessionTable::new();
        let pin = Pin::from_number(1);
        let other = Pin::from_number(2);
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        for id in [a, b, c] {
            table.register(id);
        }
        table.set_room(a, Some(pin.clone()));
        table.set_room(b, Some(other));

        let members: Vec<_> = table.members_of(&pin).collect();
        assert_eq!(members, vec![a]);
    }

    #[test]
    fn test_remove_returns_prior_room() {
        let mut table = SessionTable::new();
        let id = ConnectionId::new();
        table.register(id);
        table.set_room(id, Some(Pin::from_number(9)));

        let session = table.remove(id).unwrap();
        assert_eq!(session.current_room, Some(Pin::from_number(9)));
        assert!(table.is_empty());
        assert!(table.remove(id).is_none());
    }

    #[test]
    fn test_removed_session_reports_its_age() {
        let mut table = SessionTable::new();
        let id = ConnectionId::new();
        let before = Instant::now();
        table.register(id);
        std::thread::sleep(std::time::Duration::from_millis(5));

        let session = table.remove(id).unwrap();
        assert!(session.connected_at >= before);
        assert!(session.connected_at.elapsed() >= std::time::Duration::from_millis(5));
    }
}
