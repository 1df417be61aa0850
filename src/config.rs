//! Server and client configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the server binds when none is configured
pub const DEFAULT_PORT: u16 = 50000;

/// Capacity of each event queue feeding the event loop
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// How long the client waits for any inbound line after sending one
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration
///
/// # Example
///
/// ```
/// use chat_relay::ServerConfig;
///
/// let config = ServerConfig::default().with_port(0).with_queue_capacity(64);
/// assert_eq!(config.bind_address().port(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port, bound on all interfaces
    pub port: u16,

    /// Capacity of the new-connection, dead-connection and outbound queues
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Set the port to bind (0 picks an ephemeral port)
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the capacity of each event queue
    ///
    /// A capacity of zero is raised to one since tokio channels require it.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Address the listener binds: `0.0.0.0:<port>`
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 50000);
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.bind_address().to_string(), "0.0.0.0:50000");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = ServerConfig::default().with_queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);
    }
}
