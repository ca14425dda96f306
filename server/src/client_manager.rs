//! Connected client registry and message dispatch
//!
//! Every accepted connection registers an outbound channel here. A dedicated
//! writer task drains each channel into its socket, so lines sent to one
//! client are written whole and in order, while different clients are
//! written to concurrently.

use log::{debug, info};
use shared::Message;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub type ClientId = u32;

/// Outbound side of one connected client.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    /// Encoded, newline-terminated lines waiting for the writer task
    sender: mpsc::UnboundedSender<String>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        Self { id, addr, sender }
    }

    /// Queues a message for this client. Returns false if its writer is gone.
    pub fn send(&self, message: &Message) -> bool {
        self.sender.send(message.to_line()).is_ok()
    }
}

/// Tracks connected clients and fans messages out to them.
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    /// Next available client ID. Never reused within a process.
    next_client_id: ClientId,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> ClientId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        client_id
    }

    /// Removes a client. Dropping its sender lets the writer task flush what
    /// is already queued and then close the socket.
    pub fn remove_client(&mut self, client_id: ClientId) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("Client {} ({}) disconnected", client.id, client.addr);
            true
        } else {
            false
        }
    }

    pub fn send_to(&self, client_id: ClientId, message: &Message) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => {
                let sent = client.send(message);
                if !sent {
                    debug!("Writer for client {} already closed", client_id);
                }
                sent
            }
            None => false,
        }
    }

    pub fn broadcast(&self, message: &Message) {
        self.broadcast_excluding(message, &[]);
    }

    pub fn broadcast_excluding(&self, message: &Message, exclude: &[ClientId]) {
        for client in self.clients.values() {
            if exclude.contains(&client.id) {
                continue;
            }
            if !client.send(message) {
                debug!("Dropped {} for closed client {}", message.header, client.id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Header;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_client_ids_are_sequential_and_not_reused() {
        let mut manager = ClientManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.add_client(test_addr(), tx.clone());
        let second = manager.add_client(test_addr(), tx.clone());
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        assert!(manager.remove_client(first));
        let third = manager.add_client(test_addr(), tx);
        assert_eq!(third, 3);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new();
        assert!(!manager.remove_client(999));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_send_to_single_client() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let id1 = manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr(), tx2);

        assert!(manager.send_to(id1, &Message::new(Header::CanvasRequest, "true")));
        assert!(!manager.send_to(42, &Message::new(Header::CanvasRequest, "true")));

        assert_eq!(drain(&mut rx1), vec!["CANVAS_REQUEST-true\n".to_string()]);
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_broadcast_excluding_skips_sender() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        let id1 = manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr(), tx2);
        manager.add_client(test_addr(), tx3);

        manager.broadcast_excluding(&Message::new(Header::Draw, "{}"), &[id1]);

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2).len(), 1);
        assert_eq!(drain(&mut rx3).len(), 1);

        manager.broadcast(&Message::empty(Header::LobbyStartCountdown));
        assert_eq!(drain(&mut rx1), vec!["LOBBY_START_COUNTDOWN-\n".to_string()]);
    }

    #[test]
    fn test_send_to_closed_writer_reports_failure() {
        let mut manager = ClientManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx);
        drop(rx);

        assert!(!manager.send_to(id, &Message::empty(Header::CanvasRelease)));
        // Broadcasting to a closed writer must not panic.
        manager.broadcast(&Message::empty(Header::CanvasRelease));
    }
}
