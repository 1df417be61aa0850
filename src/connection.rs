//! Connection handle definition
//!
//! Represents the write side of an accepted connection together with the
//! identity the registry keys it by. The read side stays with the handler.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::SendError;
use crate::types::ConnectionId;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Live connection handle
///
/// Cheap to clone; all clones share one writer and compare equal by ID,
/// so a handle taken from the registry identifies the same connection the
/// handler registered.
#[derive(Clone)]
pub struct Connection {
    /// Unique identifier for this connection
    id: ConnectionId,
    /// Remote address, when the stream has one
    peer: Option<SocketAddr>,
    /// Server → client byte stream
    writer: Arc<Mutex<BoxedWriter>>,
}

impl Connection {
    /// Wrap the write half of a stream in a new connection handle
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: ConnectionId::new(),
            peer: None,
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Attach the remote address for logging
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the remote address, if known
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Write raw text to the connection
    ///
    /// Returns an error if the stream is broken (peer gone or shut down).
    pub async fn write_line(&self, line: &str) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the connection
    pub async fn close(&self) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl std::hash::Hash for Connection {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "{} ({})", self.id, peer),
            None => write!(f, "{}", self.id),
        }
    }
}
