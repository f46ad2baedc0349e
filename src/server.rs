//! RoomService actor implementation
//!
//! The central actor that owns all state: rooms, sessions, deletion timers
//! and connection outlets. Every mutation runs on this one task, so room
//! capacity checks and pin allocation never race.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::broadcaster::Broadcaster;
use crate::error::RoomError;
use crate::message::{ClientMessage, ServerMessage};
use crate::registry::RoomRegistry;
use crate::room::{validate_capacity, ChatMessage};
use crate::scheduler::{LifecycleScheduler, TimerToken, DEFAULT_GRACE_PERIOD};
use crate::session::SessionTable;
use crate::types::{ConnectionId, Pin};

/// Commands sent from connection handlers to the RoomService actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection established
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Connection closed
    Disconnect { connection_id: ConnectionId },
    /// Create a new room
    CreateRoom {
        connection_id: ConnectionId,
        room_number: Option<String>,
        max_participants: usize,
        nickname: String,
    },
    /// Join an existing room
    JoinRoom {
        connection_id: ConnectionId,
        pin: String,
        nickname: String,
    },
    /// Leave the current room
    LeaveRoom { connection_id: ConnectionId },
    /// Send a chat message
    SendMessage {
        connection_id: ConnectionId,
        message: ChatMessage,
    },
    /// List rooms with a free seat
    GetAvailableRooms { connection_id: ConnectionId },
    /// List participants of the current room
    GetRoomParticipants { connection_id: ConnectionId },
    /// Frame that could not be parsed
    Malformed {
        connection_id: ConnectionId,
        reason: String,
    },
}

impl ServerCommand {
    /// Convert a parsed client frame into a command
    pub fn from_client(connection_id: ConnectionId, msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::CreateRoom {
                max_participants,
                room_number,
                nickname,
            } => ServerCommand::CreateRoom {
                connection_id,
                room_number,
                max_participants,
                nickname,
            },
            ClientMessage::JoinRoom { pin, nickname } => ServerCommand::JoinRoom {
                connection_id,
                pin,
                nickname,
            },
            ClientMessage::LeaveRoom => ServerCommand::LeaveRoom { connection_id },
            ClientMessage::SendMessage {
                id,
                author,
                content,
            } => ServerCommand::SendMessage {
                connection_id,
                message: ChatMessage {
                    id,
                    author,
                    content,
                },
            },
            ClientMessage::GetAvailableRooms => ServerCommand::GetAvailableRooms { connection_id },
            ClientMessage::GetRoomParticipants => {
                ServerCommand::GetRoomParticipants { connection_id }
            }
        }
    }
}

/// Tunables for the RoomService
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long an empty room survives before it is destroyed
    pub grace_period: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// A deletion timer that fired
#[derive(Debug)]
struct Expiry {
    pin: Pin,
    token: TimerToken,
}

/// The main RoomService actor
pub struct RoomService {
    registry: RoomRegistry,
    sessions: SessionTable,
    scheduler: LifecycleScheduler,
    broadcaster: Broadcaster,
    config: ServiceConfig,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Timer callbacks post here
    expiry_tx: mpsc::UnboundedSender<Expiry>,
    expiry_rx: mpsc::UnboundedReceiver<Expiry>,
}

impl RoomService {
    /// Create a new RoomService with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, config: ServiceConfig) -> Self {
        Self::with_registry(receiver, config, RoomRegistry::new())
    }

    pub fn with_registry(
        receiver: mpsc::Receiver<ServerCommand>,
        config: ServiceConfig,
        registry: RoomRegistry,
    ) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            sessions: SessionTable::new(),
            scheduler: LifecycleScheduler::new(),
            broadcaster: Broadcaster::new(),
            config,
            receiver,
            expiry_tx,
            expiry_rx,
        }
    }

    /// Run the RoomService event loop
    ///
    /// Processes commands and timer expiries until all command senders are
    /// dropped. Pending deletion timers are aborted on the way out.
    pub async fn run(mut self) {
        info!(
            "RoomService started (grace period {:?})",
            self.config.grace_period
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(expiry) = self.expiry_rx.recv() => {
                    self.handle_expiry(expiry.pin, expiry.token);
                }
            }
            self.disconnect_lagging();
        }

        self.scheduler.cancel_all();
        info!("RoomService shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                connection_id,
                sender,
            } => self.handle_connect(connection_id, sender),
            ServerCommand::Disconnect { connection_id } => self.handle_disconnect(connection_id),
            ServerCommand::CreateRoom {
                connection_id,
                room_number,
                max_participants,
                nickname,
            } => self.handle_create_room(connection_id, room_number, max_participants, nickname),
            ServerCommand::JoinRoom {
                connection_id,
                pin,
                nickname,
            } => self.handle_join_room(connection_id, pin, nickname),
            ServerCommand::LeaveRoom { connection_id } => self.handle_leave_room(connection_id),
            ServerCommand::SendMessage {
                connection_id,
                message,
            } => self.handle_send_message(connection_id, message),
            ServerCommand::GetAvailableRooms { connection_id } => {
                self.handle_get_available_rooms(connection_id)
            }
            ServerCommand::GetRoomParticipants { connection_id } => {
                self.handle_get_room_participants(connection_id)
            }
            ServerCommand::Malformed {
                connection_id,
                reason,
            } => self.reply(connection_id, ServerMessage::invalid_message(&reason)),
        }
    }

    /// Handle new connection
    fn handle_connect(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        info!("Connection {} registered", connection_id);
        self.sessions.register(connection_id);
        self.broadcaster.register(connection_id, sender);
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.registry.len()
        );
    }

    /// Handle disconnection: same room effects as an explicit leave
    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        info!("Connection {} disconnected", connection_id);

        self.leave_current_room(connection_id);
        if let Some(session) = self.sessions.remove(connection_id) {
            debug!(
                "Session {} ({:?}) ended after {:?}",
                connection_id,
                session.nickname,
                session.connected_at.elapsed()
            );
        }
        self.broadcaster.unregister(connection_id);

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.registry.len()
        );
    }

    /// Handle room creation
    fn handle_create_room(
        &mut self,
        connection_id: ConnectionId,
        room_number: Option<String>,
        max_participants: usize,
        nickname: String,
    ) {
        if !self.sessions.contains(connection_id) {
            return;
        }

        if let Err(err) = self.check_not_in_room(connection_id) {
            self.reply(connection_id, ServerMessage::error(&err));
            return;
        }

        let created = validate_capacity(max_participants).and_then(|max| {
            self.registry
                .create_room(room_number, max, connection_id, nickname.clone())
                .map(|room| room.summary())
        });

        let summary = match created {
            Ok(summary) => summary,
            Err(err) => {
                if err == RoomError::AllocatorExhausted {
                    error!("Room creation failed for {}: {}", connection_id, err);
                }
                self.reply(connection_id, ServerMessage::error(&err));
                return;
            }
        };

        info!(
            "Connection {} created room {} ({}, max {})",
            connection_id, summary.pin, summary.room_number, summary.max_participants
        );

        self.sessions.set_identity(connection_id, nickname);
        self.sessions
            .set_room(connection_id, Some(summary.pin.clone()));
        self.reply(connection_id, ServerMessage::RoomCreated(summary));
        self.broadcast_available_rooms();
    }

    /// Handle room joining
    fn handle_join_room(&mut self, connection_id: ConnectionId, pin: String, nickname: String) {
        if !self.sessions.contains(connection_id) {
            return;
        }

        let pin = Pin::from_string(pin);

        let joined = self.check_not_in_room(connection_id).and_then(|()| {
            self.registry
                .join_room(&pin, connection_id, nickname.clone())
                .map(|room| (room.messages().to_vec(), room.nicknames()))
        });

        let (history, participants) = match joined {
            Ok(joined) => joined,
            Err(err) => {
                debug!("Connection {} failed to join {}: {}", connection_id, pin, err);
                self.reply(connection_id, ServerMessage::join_error(&err));
                return;
            }
        };

        if self.scheduler.cancel(&pin) {
            info!("Room {} rejoined before its grace period ended", pin);
        }

        info!("Connection {} joined room {}", connection_id, pin);
        self.sessions.set_identity(connection_id, nickname.clone());
        self.sessions.set_room(connection_id, Some(pin.clone()));

        self.reply(
            connection_id,
            ServerMessage::RoomHistory { messages: history },
        );
        self.broadcaster.to_room(
            &self.sessions,
            &pin,
            ServerMessage::RoomParticipants { participants },
        );
        self.broadcaster.to_room(
            &self.sessions,
            &pin,
            ServerMessage::UserJoined {
                nickname,
                pin: pin.clone(),
            },
        );
        self.broadcast_available_rooms();
    }

    /// Handle voluntary room leaving
    fn handle_leave_room(&mut self, connection_id: ConnectionId) {
        if !self.leave_current_room(connection_id) {
            debug!("Connection {} left while not in a room", connection_id);
        }
    }

    /// Handle chat message
    fn handle_send_message(&mut self, connection_id: ConnectionId, mut message: ChatMessage) {
        let Some(session) = self.sessions.get(connection_id) else {
            return;
        };

        // Stray sends during room transitions are tolerated, not reported
        let Some(pin) = session.current_room.clone() else {
            debug!("Dropping message from {}: not in a room", connection_id);
            return;
        };

        if message.author.is_empty() {
            message.author = session.nickname.clone();
        }

        match self.registry.append_message(&pin, message.clone()) {
            Ok(true) => {
                self.broadcaster.to_room(
                    &self.sessions,
                    &pin,
                    ServerMessage::ReceiveMessage(message),
                );
            }
            Ok(false) => {
                debug!(
                    "Duplicate message {:?} in room {} ignored",
                    message.id, pin
                );
            }
            Err(err) => {
                debug!("Dropping message from {}: {}", connection_id, err);
            }
        }
    }

    /// Handle available rooms request
    fn handle_get_available_rooms(&mut self, connection_id: ConnectionId) {
        let rooms = self.registry.snapshot_available();
        self.reply(connection_id, ServerMessage::AvailableRooms { rooms });
    }

    /// Handle participant list request
    fn handle_get_room_participants(&mut self, connection_id: ConnectionId) {
        let Some(pin) = self.sessions.current_room(connection_id) else {
            return;
        };

        let participants = self.registry.participants_display_list(pin);
        self.reply(connection_id, ServerMessage::RoomParticipants { participants });
    }

    /// Handle a fired deletion timer
    fn handle_expiry(&mut self, pin: Pin, token: TimerToken) {
        if !self.scheduler.complete(&pin, token) {
            debug!("Ignoring stale deletion timer for room {}", pin);
            return;
        }

        match self.registry.get(&pin) {
            Some(room) if room.is_empty() => {
                let age = room.created_at.elapsed();
                self.registry.remove(&pin);
                info!("Room {} destroyed after grace period (age {:?})", pin, age);
                self.broadcast_available_rooms();
            }
            Some(_) => debug!("Room {} repopulated, keeping it", pin),
            None => debug!("Room {} already gone", pin),
        }
    }

    /// Helper: Remove a connection from its room and handle cleanup
    ///
    /// Returns false if the connection was not in a room.
    fn leave_current_room(&mut self, connection_id: ConnectionId) -> bool {
        let Some(pin) = self.sessions.take_room(connection_id) else {
            return false;
        };

        let nickname = self
            .sessions
            .get(connection_id)
            .map(|s| s.nickname.clone())
            .unwrap_or_default();

        info!("Connection {} left room {}", connection_id, pin);

        let remaining = self
            .registry
            .leave(&pin, connection_id)
            .map(|room| room.nicknames());

        match remaining {
            None => debug!("Room {} no longer exists", pin),
            Some(participants) if participants.is_empty() => self.arm_deletion(pin),
            Some(participants) => {
                self.broadcaster.to_room(
                    &self.sessions,
                    &pin,
                    ServerMessage::RoomParticipants { participants },
                );
                self.broadcaster.to_room(
                    &self.sessions,
                    &pin,
                    ServerMessage::UserLeft {
                        nickname,
                        pin: pin.clone(),
                    },
                );
            }
        }

        self.broadcast_available_rooms();
        true
    }

    /// Helper: Start the grace period for an empty room
    fn arm_deletion(&mut self, pin: Pin) {
        let expiry_tx = self.expiry_tx.clone();
        self.scheduler
            .arm(pin, self.config.grace_period, move |pin, token| {
                let _ = expiry_tx.send(Expiry { pin, token });
            });
    }

    /// Helper: Reject create/join while the session already has a room
    fn check_not_in_room(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        match self.sessions.current_room(connection_id) {
            Some(pin) => Err(RoomError::AlreadyInRoom(pin.clone())),
            None => Ok(()),
        }
    }

    /// Helper: Send to one connection, logging a dropped event
    fn reply(&mut self, connection_id: ConnectionId, msg: ServerMessage) {
        if let Err(e) = self.broadcaster.to_connection(connection_id, msg) {
            debug!("Reply to {} dropped: {}", connection_id, e);
        }
    }

    /// Helper: Disconnect every connection the broadcaster cut off
    ///
    /// Their outlets are already gone, so their write tasks close the
    /// sockets; the room effects are those of a normal disconnect. A
    /// disconnect can cut off further connections, hence the loop.
    fn disconnect_lagging(&mut self) {
        loop {
            let lagging = self.broadcaster.take_lagging();
            if lagging.is_empty() {
                break;
            }
            for connection_id in lagging {
                self.handle_disconnect(connection_id);
            }
        }
    }

    /// Helper: Push the available room list to every connection
    fn broadcast_available_rooms(&mut self) {
        let rooms = self.registry.snapshot_available();
        self.broadcaster
            .to_all(ServerMessage::AvailableRooms { rooms });
    }
}
