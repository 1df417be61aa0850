//! Error types for the chat relay
//!
//! Defines server startup errors, per-connection write errors and the
//! client's fatal errors. Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;

use thiserror::Error;

/// Server-level errors
///
/// Only binding the listening socket is fatal; everything that happens
/// on an individual connection is logged and absorbed by the event loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound (fatal)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO error on the listening socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection write errors
///
/// Occurs when a broadcast line cannot be written to one connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The underlying stream rejected the write
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Client errors
///
/// Every variant ends the client session; there is no local recovery.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dialing the server failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending the login line failed
    #[error("failed to log in: {0}")]
    Login(#[source] std::io::Error),

    /// No line arrived before the read deadline expired
    #[error("Timeout. Maybe something wrong with network?")]
    Timeout,

    /// The server closed the connection
    #[error("Server has stopped")]
    ServerClosed,

    /// Any other read or write failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
