//! PIN Chat Server Library
//!
//! Ephemeral, PIN-protected WebSocket chat rooms built with
//! tokio-tungstenite, using the Actor pattern for state management.
//!
//! # Features
//! - Room creation with unique 6-digit pins and a 2-10 member capacity
//! - Joining by pin, with full message history replay
//! - Live participant lists and a global feed of rooms with free seats
//! - Empty rooms kept for a grace period so members can reconnect
//! - Disconnection handled exactly like leaving
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomService` is the central actor owning the room registry, session
//!   table, deletion timers and connection outlets
//! - Each connection has a `handler` task communicating with the service
//! - Deletion timers post their expiry back into the actor, which checks
//!   the room is still empty before destroying it
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use pin_chat_server::{handle_connection, RoomService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!     let host: Arc<str> = "localhost".into();
//!
//!     tokio::spawn(RoomService::new(cmd_rx, ServiceConfig::default()).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, cmd_tx.clone(), host.clone()));
//!     }
//! }
//! ```

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod pin;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcaster::Broadcaster;
pub use config::Config;
pub use error::{AppError, RoomError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use pin::PinAllocator;
pub use registry::RoomRegistry;
pub use room::{ChatMessage, Room, RoomSummary};
pub use scheduler::{LifecycleScheduler, TimerToken};
pub use server::{RoomService, ServerCommand, ServiceConfig};
pub use session::{Session, SessionTable};
pub use types::{ConnectionId, Pin};
