//! Connection handler
//!
//! Handles one accepted connection: reads the login line, registers the
//! username, relays every following line to the event loop and finally
//! reports the connection as dead.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::message::Message;
use crate::registry::Registry;

/// A connection whose read loop has ended
#[derive(Debug)]
pub struct DeadConnection {
    pub username: String,
    pub connection: Connection,
}

/// Everything a handler needs from the server
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Shared username registry
    pub registry: Arc<Registry>,
    /// Outbound message queue (drained by the event loop)
    pub outbound: mpsc::Sender<Message>,
    /// Dead connection queue (drained by the event loop)
    pub dead: mpsc::Sender<DeadConnection>,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

/// Handle a connection until its read side fails
///
/// `reader` is the read half of the stream whose write half is wrapped in
/// `connection`. The handler never closes the connection itself.
pub async fn handle_connection<R>(reader: R, connection: Connection, ctx: HandlerContext)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    let login = tokio::select! {
        _ = ctx.shutdown.cancelled() => return,
        line = read_line(&mut reader, &mut buf) => line,
    };

    let login = match login {
        Ok(Some(line)) => line,
        Ok(None) => {
            debug!(connection = %connection, "Connection closed before login");
            return;
        }
        Err(e) => {
            debug!(connection = %connection, error = %e, "Login read failed");
            return;
        }
    };

    let username = login.trim_end_matches(&['\r', '\n'][..]).to_string();

    if ctx.registry.add(&username, connection.clone()).await {
        if ctx.outbound.send(Message::online(&username)).await.is_err() {
            debug!("Event loop closed, dropping online notice for {}", username);
        }
    }

    info!(connection = %connection, username = %username, "User logged in");

    loop {
        let line = tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            line = read_line(&mut reader, &mut buf) => line,
        };

        match line {
            Ok(Some(text)) => {
                if ctx.outbound.send(Message::new(&username, text)).await.is_err() {
                    debug!("Event loop closed, ending read loop for {}", connection);
                    break;
                }
            }
            Ok(None) => {
                debug!(connection = %connection, "Connection closed by peer");
                break;
            }
            Err(e) => {
                debug!(connection = %connection, error = %e, "Read failed");
                break;
            }
        }
    }

    info!(connection = %connection, username = %username, "User disconnected");

    let dead = DeadConnection {
        username,
        connection,
    };
    if let Err(e) = ctx.dead.send(dead).await {
        debug!("Event loop closed, dropping dead connection {}", e.0.connection);
    }
}

/// Read one newline-terminated line
///
/// Returns `Ok(None)` at end of stream, including when the stream ends in
/// the middle of a line. Bytes are decoded lossily so invalid UTF-8 never
/// ends a connection.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    reader.read_until(b'\n', buf).await?;

    if buf.last() == Some(&b'\n') {
        Ok(Some(String::from_utf8_lossy(buf).into_owned()))
    } else {
        Ok(None)
    }
}
