//! A single room: its members in join order, their readiness, and fan-out
//! of encoded messages to everyone still connected.

use crate::client_manager::{ClientManager, ConnectionId};
use log::{debug, error};
use shared::{ClientId, RoomCode, ServerMessage};
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct Member {
    connection: ConnectionId,
    id: ClientId,
}

/// A broadcast group of connections sharing one room code.
///
/// `ready` is always a subset of the members and every member has exactly one
/// recorded client ID. Members are kept in join order so `snapshot` lists
/// players the way they arrived.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    members: Vec<Member>,
    ready: HashSet<ConnectionId>,
}

impl Room {
    pub fn new(code: RoomCode) -> Self {
        Self {
            code,
            members: Vec::new(),
            ready: HashSet::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Adds a member. Joining again keeps the original entry and returns false.
    pub fn join(&mut self, connection: ConnectionId, id: ClientId) -> bool {
        if self.contains(connection) {
            return false;
        }
        self.members.push(Member { connection, id });
        true
    }

    /// Removes a member and its readiness, returning the ID that left
    pub fn leave(&mut self, connection: ConnectionId) -> Option<ClientId> {
        let index = self.members.iter().position(|m| m.connection == connection)?;
        self.ready.remove(&connection);
        Some(self.members.remove(index).id)
    }

    /// Marks a member ready and reports whether every member now is.
    ///
    /// Readiness is never reset, so once the gate has opened every further
    /// call by a member reports true again.
    pub fn set_ready(&mut self, connection: ConnectionId) -> bool {
        if !self.contains(connection) {
            return false;
        }
        self.ready.insert(connection);
        self.is_all_ready()
    }

    pub fn is_all_ready(&self) -> bool {
        !self.members.is_empty() && self.ready.len() == self.members.len()
    }

    pub fn is_ready(&self, connection: ConnectionId) -> bool {
        self.ready.contains(&connection)
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.members.iter().any(|m| m.connection == connection)
    }

    pub fn client_id_of(&self, connection: ConnectionId) -> Option<&ClientId> {
        self.members
            .iter()
            .find(|m| m.connection == connection)
            .map(|m| &m.id)
    }

    /// Member IDs in join order, as sent in `room_state`
    pub fn snapshot(&self) -> Vec<ClientId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members.iter().map(|m| m.connection)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Serializes `message` once and queues it for every open member except
    /// `exclude`. Returns how many members it was handed to.
    pub fn broadcast(
        &self,
        clients: &ClientManager,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                error!("Room {}: {}", self.code, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for connection in self.connections() {
            if Some(connection) == exclude || !clients.is_open(connection) {
                continue;
            }
            if clients.send_to(connection, text.clone()) {
                delivered += 1;
            }
        }
        debug!(
            "Room {}: broadcast to {}/{} members",
            self.code,
            delivered,
            self.members.len()
        );
        delivered
    }
}
