//! Relay protocol handler
//!
//! [`Relay`] owns every piece of mutable server state (connection registry,
//! matchmaking queue, room store) and applies one transport event at a time.
//! Nothing in here awaits: outbound messages are queued on per-connection
//! channels and written by the network layer.
//!
//! Client mistakes are never answered with an error. Malformed frames,
//! unknown room codes and room-scoped messages from players outside any room
//! are dropped and, at most, logged.

use crate::client_manager::{ClientManager, ConnectionId, OutboundSender};
use crate::matchmaking::{EnqueueOutcome, MatchmakingQueue};
use crate::room_store::RoomStore;
use crate::utils::SeedSource;
use log::{debug, error, info, trace, warn};
use serde_json::{Map, Value};
use shared::{ClientId, ClientMessage, ProtocolError, RoomCode, ServerMessage};
use std::net::SocketAddr;

/// Point-in-time counters for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub rooms: usize,
    pub queued: usize,
}

#[derive(Default)]
pub struct Relay {
    clients: ClientManager,
    queue: MatchmakingQueue,
    rooms: RoomStore,
    seeds: SeedSource,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an accepted connection and greets it with its client ID
    pub fn handle_connect(
        &mut self,
        connection: ConnectionId,
        addr: SocketAddr,
        sender: OutboundSender,
    ) -> ClientId {
        let id = self.clients.register(connection, addr, sender);
        self.send(connection, &ServerMessage::Welcome { id: id.clone() });
        id
    }

    /// Decodes and applies one inbound text frame
    pub fn handle_message(&mut self, connection: ConnectionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(message) => self.dispatch(connection, message),
            Err(ProtocolError::InvalidJson(e)) => {
                warn!("Dropping malformed frame from {}: {}", connection, e)
            }
            Err(e) => debug!("Dropping frame from {}: {}", connection, e),
        }
    }

    /// Cleans up after a closed connection: queue, room, then registry
    pub fn handle_disconnect(&mut self, connection: ConnectionId) {
        if self.queue.remove_if_present(connection) {
            debug!("{} left the matchmaking queue", connection);
        }
        self.depart(connection);
        self.clients.unregister(connection);
    }

    pub fn dispatch(&mut self, connection: ConnectionId, message: ClientMessage) {
        let id = match self.clients.lookup(connection) {
            Ok(id) => id,
            Err(e) => {
                warn!("Ignoring message: {}", e);
                return;
            }
        };
        debug!("Client {}: {:?}", id, message);

        match message {
            ClientMessage::FindMatch => self.find_match(connection),
            ClientMessage::CreateRoom { code } => self.create_room(connection, id, code),
            ClientMessage::JoinRoom { code } => self.join_room(connection, id, code),
            ClientMessage::LeaveRoom => self.depart(connection),
            ClientMessage::Ready => self.ready(connection),
            ClientMessage::StartGame { fields } => self.start_game(connection, fields),
            ClientMessage::State { x, y } => self.relay_state(connection, x, y),
            ClientMessage::Game { payload } => self.relay_game(connection, payload),
            ClientMessage::Unknown(kind) => {
                debug!("Ignoring unknown message type {:?} from {}", kind, id)
            }
        }
    }

    fn find_match(&mut self, connection: ConnectionId) {
        // A player is either waiting or seated, never both.
        self.depart(connection);

        match self.queue.enqueue(connection) {
            EnqueueOutcome::Waiting | EnqueueOutcome::AlreadyWaiting => {
                self.send(connection, &ServerMessage::WaitingForMatch);
            }
            EnqueueOutcome::Paired { host, guest } => self.seat_match(host, guest),
        }
    }

    fn seat_match(&mut self, host: ConnectionId, guest: ConnectionId) {
        let (host_id, guest_id) = match (self.clients.lookup(host), self.clients.lookup(guest)) {
            (Ok(h), Ok(g)) => (h, g),
            (h, g) => {
                // Disconnects dequeue synchronously, so this means a registry bug.
                error!("Matched unregistered connection: {:?} / {:?}", h, g);
                return;
            }
        };

        let code = self.rooms.create(None);
        self.rooms.join(&code, host, host_id.clone());
        self.rooms.join(&code, guest, guest_id.clone());
        info!(
            "Matched client {} (host) with client {} in room {}",
            host_id, guest_id, code
        );

        for (connection, id, is_host) in [(host, host_id, true), (guest, guest_id, false)] {
            self.send(
                connection,
                &ServerMessage::RoomJoined {
                    code: code.clone(),
                    id,
                    is_host: Some(is_host),
                },
            );
        }
        let state = self.room_state(&code);
        self.send(host, &state);
        self.send(guest, &state);
    }

    fn create_room(&mut self, connection: ConnectionId, id: ClientId, code: Option<RoomCode>) {
        let code = self.rooms.create(code.as_deref());
        self.enter_room(connection, &id, &code);

        self.send(connection, &ServerMessage::RoomCreated { code: code.clone() });
        self.send(connection, &self.room_state(&code));
        self.broadcast(&code, &ServerMessage::PlayerJoined { id }, Some(connection));
    }

    fn join_room(&mut self, connection: ConnectionId, id: ClientId, code: Option<RoomCode>) {
        let Some(code) = code.filter(|c| self.rooms.contains(c)) else {
            debug!("Client {} tried to join an unknown room", id);
            return;
        };
        self.enter_room(connection, &id, &code);

        self.send(
            connection,
            &ServerMessage::RoomJoined {
                code: code.clone(),
                id: id.clone(),
                is_host: None,
            },
        );
        self.send(connection, &self.room_state(&code));
        self.broadcast(&code, &ServerMessage::PlayerJoined { id }, Some(connection));
    }

    /// Seats a connection in `code`, first pulling it out of the queue and
    /// out of any other room it is in.
    fn enter_room(&mut self, connection: ConnectionId, id: &ClientId, code: &str) {
        self.queue.remove_if_present(connection);
        if self
            .rooms
            .room_code_of(connection)
            .is_some_and(|current| current != code)
        {
            self.depart(connection);
        }
        self.rooms.join(code, connection, id.clone());
    }

    /// Removes the connection from its room, tells the remaining members and
    /// drops the room if it is now empty. No-op outside a room.
    fn depart(&mut self, connection: ConnectionId) {
        let Some((code, id)) = self.rooms.leave(connection) else {
            return;
        };
        self.broadcast(&code, &ServerMessage::PlayerLeft { id }, None);
        self.rooms.delete_if_empty(&code);
    }

    fn ready(&mut self, connection: ConnectionId) {
        let Some((code, all_ready)) = self.rooms.set_ready(connection) else {
            return;
        };
        if all_ready {
            let seed = self.seeds.next_seed();
            info!("Room {}: everyone ready, starting with seed {}", code, seed);
            self.broadcast(&code, &ServerMessage::coop_start(seed), None);
        }
    }

    fn start_game(&mut self, connection: ConnectionId, fields: Map<String, Value>) {
        let Some(code) = self.rooms.room_code_of(connection).cloned() else {
            return;
        };
        let message = ServerMessage::start_game(fields, self.seeds.next_seed());
        info!("Room {}: start_game requested by {}", code, connection);
        self.broadcast(&code, &message, None);
    }

    fn relay_state(&mut self, connection: ConnectionId, x: Option<Value>, y: Option<Value>) {
        let Some(room) = self.rooms.find_room_of(connection) else {
            return;
        };
        let Some(id) = room.client_id_of(connection).cloned() else {
            return;
        };
        trace!("Room {}: state from {}", room.code(), id);
        room.broadcast(
            &self.clients,
            &ServerMessage::State { id, x, y },
            Some(connection),
        );
    }

    fn relay_game(&mut self, connection: ConnectionId, payload: Map<String, Value>) {
        let Some(room) = self.rooms.find_room_of(connection) else {
            return;
        };
        let Some(id) = room.client_id_of(connection).cloned() else {
            return;
        };
        trace!("Room {}: game payload from {}", room.code(), id);
        room.broadcast(&self.clients, &ServerMessage::game(payload, id), None);
    }

    fn room_state(&self, code: &str) -> ServerMessage {
        ServerMessage::RoomState {
            players: self
                .rooms
                .get(code)
                .map(|room| room.snapshot())
                .unwrap_or_default(),
        }
    }

    fn send(&self, connection: ConnectionId, message: &ServerMessage) {
        match message.encode() {
            Ok(text) => {
                self.clients.send_to(connection, text);
            }
            Err(e) => error!("{}", e),
        }
    }

    fn broadcast(&self, code: &str, message: &ServerMessage, exclude: Option<ConnectionId>) {
        if let Some(room) = self.rooms.get(code) {
            room.broadcast(&self.clients, message, exclude);
        }
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.clients.len(),
            rooms: self.rooms.len(),
            queued: self.queue.len(),
        }
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }
}
