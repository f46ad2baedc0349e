//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based unique connection identifier
//! - `Pin`: 6-digit numeric room identifier

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 assigned when the WebSocket handshake completes.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room pin (6 numeric digits, leading zeros allowed)
///
/// The sole lookup key for a room. Pins produced by the allocator are always
/// well formed; pins parsed from client input are only trimmed, so a
/// malformed pin simply fails lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Build a pin from a number in `0..1_000_000`, zero padded to 6 digits
    pub fn from_number(n: u32) -> Self {
        Self(format!("{:06}", n))
    }

    /// Create a Pin from client input (surrounding whitespace removed)
    pub fn from_string(pin: String) -> Self {
        Self(pin.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this pin has the shape of an allocated pin
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 6 && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl std::fmt::Display for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_pin_zero_padded() {
        let pin = Pin::from_number(42);
        assert_eq!(pin.as_str(), "000042");
        assert!(pin.is_well_formed());
    }

    #[test]
    fn test_pin_from_input_trimmed() {
        let pin = Pin::from_string(" 123456\n".to_string());
        assert_eq!(pin, Pin::from_number(123456));
    }

    #[test]
    fn test_pin_malformed() {
        assert!(!Pin::from_string("12a456".to_string()).is_well_formed());
        assert!(!Pin::from_string("1234567".to_string()).is_well_formed());
    }

    #[test]
    fn test_pin_serializes_as_string() {
        let json = serde_json::to_string(&Pin::from_number(7)).unwrap();
        assert_eq!(json, "\"000007\"");
    }
}
