//! User registry
//!
//! Maps each username to the ordered list of connections currently logged
//! in under it. Handlers add themselves after login; the event loop removes
//! dead connections. Both go through the same lock, so concurrent calls are
//! linearized and the first/last answers are exact.

use std::collections::HashMap;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::Connection;

/// Username → live connections
///
/// An entry exists exactly while its connection list is non-empty.
#[derive(Debug, Default)]
pub struct Registry {
    users: Mutex<HashMap<String, Vec<Connection>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection to a username
    ///
    /// Returns true if this is the username's first live connection.
    pub async fn add(&self, username: &str, connection: Connection) -> bool {
        let mut users = self.users.lock().await;
        match users.get_mut(username) {
            Some(connections) => {
                connections.push(connection);
                false
            }
            None => {
                users.insert(username.to_string(), vec![connection]);
                true
            }
        }
    }

    /// Detach a connection from a username
    ///
    /// Returns true if this was the username's last live connection.
    /// Removing a pair that is not registered is a no-op returning false.
    pub async fn remove(&self, username: &str, connection: &Connection) -> bool {
        let mut users = self.users.lock().await;

        let Some(connections) = users.get_mut(username) else {
            debug!(username, connection = %connection, "Remove for unknown user ignored");
            return false;
        };

        let Some(position) = connections.iter().position(|c| c == connection) else {
            debug!(username, connection = %connection, "Remove for unknown connection ignored");
            return false;
        };

        connections.remove(position);

        if connections.is_empty() {
            users.remove(username);
            true
        } else {
            false
        }
    }

    /// Snapshot of every registered connection, across all usernames
    pub async fn connections(&self) -> Vec<Connection> {
        let users = self.users.lock().await;
        users.values().flatten().cloned().collect()
    }

    /// Number of usernames with at least one live connection
    pub async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Number of live connections across all usernames
    pub async fn connection_count(&self) -> usize {
        self.users.lock().await.values().map(Vec::len).sum()
    }

    /// Check whether a username currently has a live connection
    pub async fn contains_user(&self, username: &str) -> bool {
        self.users.lock().await.contains_key(username)
    }

    /// Empty the registry and shut down every connection it held
    pub async fn close_all(&self) {
        let users = std::mem::take(&mut *self.users.lock().await);
        let connections: Vec<Connection> = users.into_values().flatten().collect();

        debug!("Closing {} registered connections", connections.len());

        let results = join_all(connections.iter().map(|c| c.close())).await;
        for (connection, result) in connections.iter().zip(results) {
            if let Err(e) = result {
                warn!(connection = %connection, error = %e, "Failed to close connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn connection() -> Connection {
        let (local, _remote) = tokio::io::duplex(64);
        Connection::new(local)
    }

    #[tokio::test]
    async fn test_first_add_creates_entry() {
        let registry = Registry::new();

        assert!(registry.add("alice", connection()).await);
        assert!(registry.contains_user("alice").await);
        assert_eq!(registry.user_count().await, 1);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_add_same_user() {
        let registry = Registry::new();

        assert!(registry.add("alice", connection()).await);
        assert!(!registry.add("alice", connection()).await);
        assert!(registry.add("bob", connection()).await);

        assert_eq!(registry.user_count().await, 2);
        assert_eq!(registry.connection_count().await, 3);
    }

    #[tokio::test]
    async fn test_remove_last_deletes_entry() {
        let registry = Registry::new();
        let conn = connection();

        registry.add("alice", conn.clone()).await;

        assert!(registry.remove("alice", &conn).await);
        assert!(!registry.contains_user("alice").await);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_one_of_several() {
        let registry = Registry::new();
        let first = connection();
        let second = connection();

        registry.add("alice", first.clone()).await;
        registry.add("alice", second.clone()).await;

        assert!(!registry.remove("alice", &first).await);
        assert!(registry.contains_user("alice").await);
        assert_eq!(registry.connections().await, vec![second.clone()]);

        assert!(registry.remove("alice", &second).await);
        assert!(!registry.contains_user("alice").await);
    }

    #[tokio::test]
    async fn test_remove_unknown_pair_is_noop() {
        let registry = Registry::new();
        let registered = connection();
        let stranger = connection();

        registry.add("alice", registered.clone()).await;

        // Unknown user
        assert!(!registry.remove("bob", &registered).await);
        // Known user, unknown connection
        assert!(!registry.remove("alice", &stranger).await);

        assert_eq!(registry.connections().await, vec![registered]);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let registry = Registry::new();
        registry.add("alice", connection()).await;
        registry.add("bob", connection()).await;

        registry.close_all().await;

        assert_eq!(registry.user_count().await, 0);
        assert!(registry.connections().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_are_exact() {
        let registry = Arc::new(Registry::new());
        let mut tasks = Vec::new();

        // Each task logs in and out of the same username repeatedly.
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let mut firsts = 0i64;
                let mut lasts = 0i64;
                for _ in 0..200 {
                    let conn = connection();
                    if registry.add("shared", conn.clone()).await {
                        firsts += 1;
                    }
                    tokio::task::yield_now().await;
                    if registry.remove("shared", &conn).await {
                        lasts += 1;
                    }
                }
                (firsts, lasts)
            }));
        }

        let mut firsts = 0;
        let mut lasts = 0;
        for task in tasks {
            let (f, l) = task.await.unwrap();
            firsts += f;
            lasts += l;
        }

        // Every 0→1 transition is matched by exactly one 1→0 transition.
        assert!(firsts >= 1);
        assert_eq!(firsts, lasts);
        assert!(!registry.contains_user("shared").await);
    }
}
