//! Message definitions
//!
//! A relayed message is a sender name plus the text exactly as it was read
//! from the wire, terminator included. The wire format of a broadcast is
//! `"<sender>: <text>"`.

use crate::types::SERVER_USERNAME;

/// Line terminator used by server-generated notices
pub const NOTICE_TERMINATOR: &str = "\r\n";

/// A message waiting to be broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Username of the sender, or `"server"` for synthetic notices
    pub sender: String,
    /// Line text including its original terminator
    pub text: String,
}

impl Message {
    /// Create a message from a user's line
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Notice emitted when a username gets its first live connection
    pub fn online(username: &str) -> Self {
        Self::new(
            SERVER_USERNAME,
            format!("{} is online{}", username, NOTICE_TERMINATOR),
        )
    }

    /// Notice emitted when a username loses its last live connection
    pub fn offline(username: &str) -> Self {
        Self::new(
            SERVER_USERNAME,
            format!("{} is offline{}", username, NOTICE_TERMINATOR),
        )
    }

    /// Whether this message was generated by the server
    pub fn is_synthetic(&self) -> bool {
        self.sender == SERVER_USERNAME
    }

    /// Render the line written to every connection
    pub fn format_line(&self) -> String {
        format!("{}: {}", self.sender, self.text)
    }
}
