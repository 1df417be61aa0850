//! Basic type definitions for the chat relay
//!
//! Provides the newtype used as a connection's stable identity and the
//! reserved sender name for server-generated notices.

use uuid::Uuid;

/// Sender name attached to synthetic online/offline notices
pub const SERVER_USERNAME: &str = "server";

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 so a live connection can be used as a map or set key
/// without comparing the underlying socket.
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
