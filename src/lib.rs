//! Line-oriented TCP Chat Relay Library
//!
//! A minimal chat relay built on tokio: every line a client sends is
//! broadcast to every connected client, tagged with the sender's name.
//!
//! # Features
//! - Plain-text, newline-delimited protocol over TCP
//! - Login by sending a username as the first line
//! - Multiple simultaneous sessions per username
//! - Online/offline notices on a username's first/last connection
//! - Companion client with a read deadline after every sent line
//!
//! # Architecture
//! - A listener task accepts sockets and queues them for the event loop
//! - Each connection has a `handler` task that logs in and relays lines
//! - The `Registry` maps usernames to live connections behind one lock
//! - A single event loop serializes spawning, removal and broadcasting
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::ServerError> {
//!     let server = ChatServer::bind(ServerConfig::default()).await?;
//!     server.run_until_ctrl_c().await
//! }
//! ```

pub mod broadcast;
pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use broadcast::broadcast;
pub use cli::ClientArgs;
pub use client::ChatClient;
pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{ClientError, SendError, ServerError};
pub use handler::{handle_connection, DeadConnection, HandlerContext};
pub use message::Message;
pub use registry::Registry;
pub use server::{ChatServer, Event};
pub use types::{ConnectionId, SERVER_USERNAME};
