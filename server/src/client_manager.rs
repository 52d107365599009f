//! Registry of joined connections and their outbound snapshot queues
//!
//! This module tracks which connections have completed the join handshake:
//! - Connection id (which is also the id of the player's tank)
//! - Display name and peer address for logging
//! - Bounded outbound queue drained by the connection's writer task
//!
//! The registry is owned by the world task, so it is only ever touched
//! between ticks or during the broadcast step of a tick.

use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// A connection that has completed the join handshake
#[derive(Debug)]
pub struct Client {
    /// Connection id, equal to the tank id
    pub id: u32,
    pub name: String,
    pub addr: SocketAddr,
    /// Queue of snapshot frames for the writer task
    pub sender: mpsc::Sender<Arc<str>>,
    /// Snapshots skipped because the queue was full
    pub dropped_snapshots: u64,
}

impl Client {
    pub fn new(id: u32, name: String, addr: SocketAddr, sender: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id,
            name,
            addr,
            sender,
            dropped_snapshots: 0,
        }
    }
}

/// All joined clients, keyed by connection id.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<u32, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Registers a joined client. Returns false if the id is already present.
    pub fn add_client(&mut self, client: Client) -> bool {
        if self.clients.contains_key(&client.id) {
            return false;
        }
        info!("Player {} ({}) joined from {}", client.id, client.name, client.addr);
        self.clients.insert(client.id, client);
        true
    }

    /// Removes a client. Returns true if it was registered.
    pub fn remove_client(&mut self, id: u32) -> bool {
        if let Some(client) = self.clients.remove(&id) {
            info!(
                "Player {} ({}) disconnected ({} snapshots dropped)",
                client.id, client.name, client.dropped_snapshots
            );
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.clients.contains_key(&id)
    }

    /// Queues one snapshot to every client without waiting.
    ///
    /// A full queue means the client is slow: that snapshot is skipped for
    /// it. Returns the ids whose writer has gone away.
    pub fn broadcast(&mut self, snapshot: &Arc<str>) -> Vec<u32> {
        let mut closed = Vec::new();

        for client in self.clients.values_mut() {
            match client.sender.try_send(Arc::clone(snapshot)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    client.dropped_snapshots += 1;
                    debug!("Client {} is lagging, snapshot dropped", client.id);
                }
                Err(TrySendError::Closed(_)) => closed.push(client.id),
            }
        }

        closed
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:11000".parse().unwrap()
    }

    fn client(id: u32, capacity: usize) -> (Client, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Client::new(id, format!("p{}", id), test_addr(), tx), rx)
    }

    #[test]
    fn test_add_and_remove_client() {
        let mut registry = ClientRegistry::new();
        let (c1, _rx1) = client(1, 4);
        let (dup, _rx2) = client(1, 4);

        assert!(registry.add_client(c1));
        assert!(!registry.add_client(dup));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(1));

        assert!(registry.remove_client(1));
        assert!(!registry.remove_client(1));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let mut registry = ClientRegistry::new();
        let (c1, mut rx1) = client(1, 4);
        let (c2, mut rx2) = client(2, 4);
        registry.add_client(c1);
        registry.add_client(c2);

        let snapshot: Arc<str> = Arc::from("{\"power\":1}\n");
        assert!(registry.broadcast(&snapshot).is_empty());

        assert_eq!(rx1.recv().await.as_deref(), Some("{\"power\":1}\n"));
        assert_eq!(rx2.recv().await.as_deref(), Some("{\"power\":1}\n"));
    }

    #[test]
    fn test_broadcast_skips_full_queue() {
        let mut registry = ClientRegistry::new();
        let (c1, mut rx1) = client(1, 1);
        registry.add_client(c1);

        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");
        assert!(registry.broadcast(&a).is_empty());
        assert!(registry.broadcast(&b).is_empty());

        assert_eq!(rx1.try_recv().ok().as_deref(), Some("a"));
        assert!(rx1.try_recv().is_err());
        assert_eq!(registry.clients[&1].dropped_snapshots, 1);
    }

    #[test]
    fn test_broadcast_reports_closed_clients() {
        let mut registry = ClientRegistry::new();
        let (c1, rx1) = client(1, 4);
        let (c2, _rx2) = client(2, 4);
        registry.add_client(c1);
        registry.add_client(c2);
        drop(rx1);

        let closed = registry.broadcast(&Arc::from("x"));
        assert_eq!(closed, vec![1]);
    }
}
