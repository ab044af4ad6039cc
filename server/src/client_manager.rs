//! Connection registry for the relay server
//!
//! This module handles the server-side bookkeeping of connected clients, including:
//! - Issuing the public client identifier when a connection is accepted
//! - Mapping transport connection handles back to their client identifier
//! - Owning the outbound channel used to deliver messages to each connection
//!
//! Identifiers are handed out sequentially and never reused while the
//! process runs, so a late message about a closed connection can never be
//! attributed to a newer client.

use log::{debug, info, warn};
use shared::ClientId;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames queued per connection before further frames to it are dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1000;

/// Outbound half of a connection: serialized JSON text frames.
pub type OutboundSender = mpsc::Sender<String>;
pub type OutboundReceiver = mpsc::Receiver<String>;

/// Creates the bounded queue between the relay and a connection's writer task
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

/// Opaque transport handle for one accepted connection
///
/// Allocated by the network layer in accept order. Used as the key for
/// every per-connection lookup instead of the socket itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is not registered")]
    NotFound(ConnectionId),
}

/// A registered connection and the means to reach it
#[derive(Debug)]
pub struct Client {
    /// Public identifier announced in `welcome`
    pub id: ClientId,
    /// Network address of the peer, for logging
    pub addr: SocketAddr,
    /// When the connection was registered
    pub connected_at: Instant,
    sender: OutboundSender,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: OutboundSender) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a text frame for this client
    ///
    /// Returns false if the frame was dropped: either the connection's writer
    /// has gone away or the client has stopped reading and its queue is full.
    /// The failure is not propagated; delivery is best-effort.
    pub fn send(&self, text: String) -> bool {
        match self.sender.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for client {}, dropping message", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Dropping message for closed client {}", self.id);
                false
            }
        }
    }

    /// True while the connection's writer is still draining messages
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Manages all registered connections
///
/// The ClientManager is the only place client identifiers are created.
/// Every other component refers to connections by [`ConnectionId`] and asks
/// the manager to resolve or reach them.
pub struct ClientManager {
    /// Registered clients indexed by their transport handle
    clients: HashMap<ConnectionId, Client>,
    /// Next identifier to hand out
    next_client_id: u64,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    /// Creates an empty registry. Client IDs start from 1.
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Registers a newly accepted connection and returns its client ID
    ///
    /// A handle that is somehow registered twice keeps only the newest
    /// registration; the stale client is logged and dropped.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        addr: SocketAddr,
        sender: OutboundSender,
    ) -> ClientId {
        let client_id = self.next_client_id.to_string();
        self.next_client_id += 1;

        let client = Client::new(client_id.clone(), addr, sender);
        if let Some(stale) = self.clients.insert(connection, client) {
            warn!(
                "Connection {} re-registered, dropping stale client {}",
                connection, stale.id
            );
        }
        info!("Client {} connected from {}", client_id, addr);

        client_id
    }

    /// Resolves a connection to its client ID
    pub fn lookup(&self, connection: ConnectionId) -> Result<ClientId, RegistryError> {
        self.clients
            .get(&connection)
            .map(|client| client.id.clone())
            .ok_or(RegistryError::NotFound(connection))
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&Client> {
        self.clients.get(&connection)
    }

    /// Removes a connection on close, returning its record if it was registered
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<Client> {
        let removed = self.clients.remove(&connection);
        if let Some(client) = &removed {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
        }
        removed
    }

    /// Sends a text frame to one connection; unknown or closed connections are skipped
    pub fn send_to(&self, connection: ConnectionId, text: String) -> bool {
        match self.clients.get(&connection) {
            Some(client) => client.send(text),
            None => false,
        }
    }

    /// True if the connection is registered and its writer is still alive
    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.clients
            .get(&connection)
            .map_or(false, |client| client.is_open())
    }

    /// Returns the number of currently registered connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no connections are registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
