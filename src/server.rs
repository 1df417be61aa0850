//! ChatServer implementation
//!
//! Owns the listening socket and the event loop. The listener task pushes
//! accepted sockets onto the new-connection queue; handlers push lines and
//! their own termination onto the outbound and dead-connection queues. A
//! single event loop drains all three, one event per iteration, and is the
//! only place that spawns handlers, removes users and broadcasts.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::broadcast;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::ServerError;
use crate::handler::{handle_connection, DeadConnection, HandlerContext};
use crate::message::Message;
use crate::registry::Registry;

/// Events consumed by the event loop
#[derive(Debug)]
pub enum Event {
    /// The listener accepted a socket
    NewConnection { stream: TcpStream, peer: SocketAddr },
    /// A handler's read loop ended
    DeadConnection(DeadConnection),
    /// A line (or notice) waiting to be broadcast
    OutboundMessage(Message),
}

/// The chat relay server
///
/// Bind it, then drive it with [`ChatServer::run_until`] or
/// [`ChatServer::run_until_ctrl_c`].
pub struct ChatServer {
    /// Listening socket, moved into the accept task on run
    listener: TcpListener,
    /// Username → connections, shared with every handler
    registry: Arc<Registry>,
    /// Queue sizing
    config: ServerConfig,
}

impl ChatServer {
    /// Bind `0.0.0.0:<port>` from the given configuration
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::from_listener(listener, config))
    }

    /// Create a server around an already bound listener
    pub fn from_listener(listener: TcpListener, config: ServerConfig) -> Self {
        Self {
            listener,
            registry: Arc::new(Registry::new()),
            config,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the user registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Run until the `shutdown` future completes
    ///
    /// On shutdown the listening socket is closed first, then every handler
    /// is cancelled and every registered connection is shut down.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let ChatServer {
            listener,
            registry,
            config,
        } = self;

        let (new_tx, new_rx) = mpsc::channel(config.queue_capacity);
        let (dead_tx, dead_rx) = mpsc::channel(config.queue_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
        let shutdown_token = CancellationToken::new();

        let accept_task = tokio::spawn(accept_loop(listener, new_tx));

        let event_loop = EventLoop {
            registry: Arc::clone(&registry),
            new_rx,
            dead_rx,
            outbound_rx,
            ctx: HandlerContext {
                registry: Arc::clone(&registry),
                outbound: outbound_tx,
                dead: dead_tx,
                shutdown: shutdown_token.clone(),
            },
        };

        info!("Event loop started");
        event_loop.run(shutdown).await;
        info!("ChatServer shutting down");

        // Wait for the abort so the listening socket is closed before
        // connections are torn down.
        accept_task.abort();
        let _ = accept_task.await;

        shutdown_token.cancel();
        registry.close_all().await;

        info!("ChatServer stopped");
        Ok(())
    }

    /// Run until the process receives Ctrl-C
    pub async fn run_until_ctrl_c(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

/// Accept connections forever, handing each to the event loop
///
/// Accept errors are logged and never end the loop. The loop only stops
/// when the event loop has gone away.
async fn accept_loop(listener: TcpListener, new_connections: mpsc::Sender<(TcpStream, SocketAddr)>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("New connection from {}", peer);
                if new_connections.send((stream, peer)).await.is_err() {
                    debug!("Event loop closed, ending accept loop");
                    break;
                }
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// The single consumer of all server events
struct EventLoop {
    registry: Arc<Registry>,
    new_rx: mpsc::Receiver<(TcpStream, SocketAddr)>,
    dead_rx: mpsc::Receiver<DeadConnection>,
    outbound_rx: mpsc::Receiver<Message>,
    /// Template cloned into every spawned handler
    ctx: HandlerContext,
}

impl EventLoop {
    /// Process events until `shutdown` completes
    async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => break,
                event = self.next_event() => event,
            };

            match event {
                Some(event) => self.handle_event(event).await,
                None => break,
            }
        }
    }

    /// Wait for the next event from any of the three queues
    ///
    /// No fairness between queues is promised.
    async fn next_event(&mut self) -> Option<Event> {
        tokio::select! {
            Some((stream, peer)) = self.new_rx.recv() => {
                Some(Event::NewConnection { stream, peer })
            }
            Some(dead) = self.dead_rx.recv() => Some(Event::DeadConnection(dead)),
            Some(message) = self.outbound_rx.recv() => Some(Event::OutboundMessage(message)),
            else => None,
        }
    }

    /// Process a single event
    async fn handle_event(&self, event: Event) {
        match event {
            Event::NewConnection { stream, peer } => {
                self.handle_new_connection(stream, peer);
            }
            Event::DeadConnection(dead) => {
                self.handle_dead_connection(dead).await;
            }
            Event::OutboundMessage(message) => {
                broadcast(&self.registry, &message).await;
            }
        }
    }

    /// Spawn a handler for an accepted socket (fire-and-forget)
    fn handle_new_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let connection = Connection::new(writer).with_peer(peer);
        debug!(connection = %connection, "Spawning connection handler");
        tokio::spawn(handle_connection(reader, connection, self.ctx.clone()));
    }

    /// Remove a dead connection and announce the user's departure if it
    /// was their last one
    async fn handle_dead_connection(&self, dead: DeadConnection) {
        let DeadConnection {
            username,
            connection,
        } = dead;

        if !self.registry.remove(&username, &connection).await {
            debug!("Connection {} of {} removed, user stays online", connection, username);
            return;
        }

        // Never block on our own queue: when it is full, deliver inline.
        match self.ctx.outbound.try_send(Message::offline(&username)) {
            Ok(()) => {}
            Err(TrySendError::Full(notice)) => {
                warn!("Outbound queue full, broadcasting offline notice for {} inline", username);
                broadcast(&self.registry, &notice).await;
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue closed, dropping offline notice for {}", username);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::timeout;

    use super::*;

    fn event_loop(capacity: usize) -> (EventLoop, mpsc::Sender<Message>, mpsc::Sender<DeadConnection>) {
        let registry = Arc::new(Registry::new());
        let (_new_tx, new_rx) = mpsc::channel(capacity);
        let (dead_tx, dead_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let event_loop = EventLoop {
            registry: Arc::clone(&registry),
            new_rx,
            dead_rx,
            outbound_rx,
            ctx: HandlerContext {
                registry,
                outbound: outbound_tx.clone(),
                dead: dead_tx.clone(),
                shutdown: CancellationToken::new(),
            },
        };
        (event_loop, outbound_tx, dead_tx)
    }

    #[tokio::test]
    async fn test_last_removal_queues_offline_notice() {
        let (mut event_loop, _outbound, _dead) = event_loop(8);
        let (local, _remote) = tokio::io::duplex(64);
        let conn = Connection::new(local);
        event_loop.registry.add("bob", conn.clone()).await;

        event_loop
            .handle_event(Event::DeadConnection(DeadConnection {
                username: "bob".to_string(),
                connection: conn,
            }))
            .await;

        assert!(!event_loop.registry.contains_user("bob").await);
        let queued = event_loop.outbound_rx.try_recv().unwrap();
        assert_eq!(queued, Message::offline("bob"));
    }

    #[tokio::test]
    async fn test_partial_removal_is_silent() {
        let (mut event_loop, _outbound, _dead) = event_loop(8);
        let (a, _ra) = tokio::io::duplex(64);
        let (b, _rb) = tokio::io::duplex(64);
        let first = Connection::new(a);
        event_loop.registry.add("alice", first.clone()).await;
        event_loop.registry.add("alice", Connection::new(b)).await;

        event_loop
            .handle_event(Event::DeadConnection(DeadConnection {
                username: "alice".to_string(),
                connection: first,
            }))
            .await;

        assert!(event_loop.registry.contains_user("alice").await);
        assert!(event_loop.outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_broadcasts_notice_inline() {
        let (event_loop, outbound, _dead) = event_loop(1);

        let (gone, _gone_remote) = tokio::io::duplex(64);
        let gone = Connection::new(gone);
        event_loop.registry.add("bob", gone.clone()).await;

        let (watcher, watcher_remote) = tokio::io::duplex(256);
        event_loop.registry.add("alice", Connection::new(watcher)).await;

        // Fill the outbound queue so the notice cannot be queued.
        outbound.try_send(Message::new("alice", "filler\n")).unwrap();

        timeout(
            Duration::from_secs(1),
            event_loop.handle_dead_connection(DeadConnection {
                username: "bob".to_string(),
                connection: gone,
            }),
        )
        .await
        .expect("event loop blocked on its own queue");

        let mut line = String::new();
        BufReader::new(watcher_remote)
            .read_line(&mut line)
            .await
            .unwrap();
        assert_eq!(line, "server: bob is offline\r\n");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (event_loop, _outbound, _dead) = event_loop(8);
        timeout(Duration::from_secs(1), event_loop.run(async {}))
            .await
            .expect("event loop ignored shutdown");
    }
}
