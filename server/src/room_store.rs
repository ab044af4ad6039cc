//! Room code → room mapping, plus the reverse index from connection to room.
//!
//! The index is updated on every join and leave so finding a sender's room
//! never scans the store. Rooms are removed as soon as their last member
//! leaves, which frees the code for reuse.

use crate::client_manager::ConnectionId;
use crate::room::Room;
use log::{debug, info, warn};
use rand::Rng;
use shared::{ClientId, RoomCode, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use std::collections::HashMap;

/// Draws one code from the unambiguous alphabet; uniqueness is the caller's job.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomCode, Room>,
    index: HashMap<ConnectionId, RoomCode>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a room for `code`, creating it if needed.
    ///
    /// Without a code a fresh one is drawn until it misses every live room.
    /// With a code, a live room there is reused as is.
    pub fn create(&mut self, code: Option<&str>) -> RoomCode {
        self.create_with(code, &mut rand::thread_rng())
    }

    pub fn create_with<R: Rng + ?Sized>(&mut self, code: Option<&str>, rng: &mut R) -> RoomCode {
        let code = match code.filter(|c| !c.is_empty()) {
            Some(code) => code.to_string(),
            None => loop {
                let candidate = generate_room_code(rng);
                if !self.rooms.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        if !self.rooms.contains_key(&code) {
            info!("Room {} created", code);
            self.rooms.insert(code.clone(), Room::new(code.clone()));
        }
        code
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    /// Adds a connection to an existing room. Returns false if the room is unknown.
    ///
    /// A connection already indexed to a different room is moved out of it
    /// first; the caller is expected to have announced that departure.
    pub fn join(&mut self, code: &str, connection: ConnectionId, id: ClientId) -> bool {
        if !self.rooms.contains_key(code) {
            return false;
        }
        if let Some(previous) = self.index.get(&connection).cloned() {
            if previous != code {
                warn!(
                    "{} joined {} while still indexed to {}",
                    connection, code, previous
                );
                self.leave(connection);
                self.delete_if_empty(&previous);
            }
        }

        let Some(room) = self.rooms.get_mut(code) else {
            return false;
        };
        if room.join(connection, id) {
            debug!("{} joined room {}", connection, code);
        }
        self.index.insert(connection, code.to_string());
        true
    }

    /// Takes a connection out of its room, returning the room code and the
    /// client ID that left. The room is left in place even if now empty;
    /// follow up with [`RoomStore::delete_if_empty`].
    pub fn leave(&mut self, connection: ConnectionId) -> Option<(RoomCode, ClientId)> {
        let code = self.index.remove(&connection)?;
        let id = self.rooms.get_mut(&code)?.leave(connection)?;
        debug!("{} left room {}", connection, code);
        Some((code, id))
    }

    /// Removes the room iff it has no members. Returns whether it was removed.
    pub fn delete_if_empty(&mut self, code: &str) -> bool {
        if self.rooms.get(code).map_or(false, Room::is_empty) {
            self.rooms.remove(code);
            info!("Room {} deleted", code);
            true
        } else {
            false
        }
    }

    pub fn room_code_of(&self, connection: ConnectionId) -> Option<&RoomCode> {
        self.index.get(&connection)
    }

    pub fn find_room_of(&self, connection: ConnectionId) -> Option<&Room> {
        let code = self.index.get(&connection)?;
        self.rooms.get(code)
    }

    /// Marks the connection ready in its room.
    ///
    /// Returns the room code and whether the readiness gate is now open,
    /// or None if the connection is in no room.
    pub fn set_ready(&mut self, connection: ConnectionId) -> Option<(RoomCode, bool)> {
        let code = self.index.get(&connection)?;
        let all_ready = self.rooms.get_mut(code)?.set_ready(connection);
        Some((code.clone(), all_ready))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
