//! Protocol message definitions
//!
//! Defines the heartbeat payload pushed from the server to every client.
//! Inbound messages have no schema: they are echoed back untouched, so only
//! the outbound direction needs a type.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;

/// Default heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;

/// Longest accepted heartbeat interval in seconds (one day)
pub const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 86_400;

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Server Messages
// ============================================================================

/// Periodic status message sent to a connected client
///
/// Always encoded as a JSON text frame: `{"count":N,"time":M}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heartbeat {
    /// Tick number, starting at 1 on the first tick
    pub count: u64,
    /// Seconds elapsed since the session opened (`count * interval_secs`)
    pub time: u64,
}

impl Heartbeat {
    /// Build the heartbeat for the given tick of a session ticking every `interval_secs`
    pub fn new(count: u64, interval_secs: u64) -> Self {
        Self {
            count,
            time: count.saturating_mul(interval_secs),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a heartbeat from JSON (primarily for testing)
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as a WebSocket text frame
    pub fn to_message(&self) -> ProtocolResult<Message> {
        Ok(Message::Text(self.to_json()?))
    }
}
