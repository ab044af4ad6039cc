//! FIFO matchmaking for anonymous two-player games
//!
//! Connections wait in arrival order. As soon as two are waiting, the two
//! oldest are taken off the queue together; the first of them hosts.

use crate::client_manager::ConnectionId;
use log::debug;
use std::collections::VecDeque;

/// Result of putting a connection in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Queued, nobody to pair with yet
    Waiting,
    /// Was already queued; position unchanged
    AlreadyWaiting,
    /// The two longest-waiting connections were removed and paired
    Paired {
        host: ConnectionId,
        guest: ConnectionId,
    },
}

#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: VecDeque<ConnectionId>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `connection` to the tail and pairs off the head if two are waiting
    pub fn enqueue(&mut self, connection: ConnectionId) -> EnqueueOutcome {
        if self.contains(connection) {
            return EnqueueOutcome::AlreadyWaiting;
        }
        self.waiting.push_back(connection);

        if self.waiting.len() >= 2 {
            if let (Some(host), Some(guest)) = (self.waiting.pop_front(), self.waiting.pop_front())
            {
                debug!("Paired {} (host) with {}", host, guest);
                return EnqueueOutcome::Paired { host, guest };
            }
        }
        EnqueueOutcome::Waiting
    }

    /// Drops a still-waiting connection. Returns whether it was queued.
    pub fn remove_if_present(&mut self, connection: ConnectionId) -> bool {
        match self.waiting.iter().position(|c| *c == connection) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.waiting.contains(&connection)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
