//! Message fan-out
//!
//! Writes one formatted line to every connection in the registry,
//! including the sender's own connections.

use tracing::{info, warn};

use crate::message::Message;
use crate::registry::Registry;

/// Broadcast a message to every registered connection
///
/// A failed write is logged and skipped; it neither aborts the fan-out nor
/// removes the connection (that happens when its own read loop ends).
/// Returns the number of connections that accepted the line.
pub async fn broadcast(registry: &Registry, message: &Message) -> usize {
    let line = message.format_line();
    let mut delivered = 0;

    for connection in registry.connections().await {
        match connection.write_line(&line).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(connection = %connection, error = %e, "Failed to deliver message"),
        }
    }

    info!("{}", line.trim_end_matches(&['\r', '\n'][..]));

    delivered
}
