//! # Room Relay Server Library
//!
//! This library provides a thin real-time relay for small multiplayer game
//! sessions. Players are grouped into rooms, either by sharing a room code or
//! by anonymous two-player matchmaking, and the server forwards their game
//! messages to the rest of the room. It does not simulate anything: gameplay
//! payloads are opaque and only re-addressed.
//!
//! ## Core Responsibilities
//!
//! ### Session Formation
//! - Explicit rooms: `create_room` (optionally with a chosen code) and `join_room`
//! - Matchmaking: `find_match` pairs the two longest-waiting players into a
//!   fresh room, the first of them as host
//!
//! ### Readiness-Gated Start
//! Each member may signal `ready`; once every member has, the room receives a
//! `start_game` with a fresh seed. Members may also start explicitly with
//! their own mode and seed.
//!
//! ### Fan-Out
//! `state` updates go to everyone in the room except the sender; `game`
//! payloads and `start_game` go to everyone including the sender.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Every connection gets its own reader and writer task, but all state
//! lives in one [`relay::Relay`] owned by a single event loop. Readers hand
//! it events over a channel and it processes them one at a time, so room
//! membership, readiness and the matchmaking queue never see interleaved
//! updates and every member of a room observes broadcasts in the same order.
//!
//! ### Best-Effort Delivery
//! Outbound messages are queued per connection and written by that
//! connection's writer task. Each queue holds a bounded number of frames:
//! a client that stops reading loses frames past that point, and a client
//! that has gone away simply stops receiving. Nobody else is affected and
//! nothing is retried.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection handles, client ID assignment and the outbound channel per client.
//!
//! ### Matchmaking Module (`matchmaking`)
//! FIFO queue of players waiting for an anonymous opponent.
//!
//! ### Room and Room Store Modules (`room`, `room_store`)
//! Room membership, readiness and broadcast, plus the code → room map with
//! its connection → room index.
//!
//! ### Relay Module (`relay`)
//! Message dispatch: turns each client message into state changes and replies.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop, per-connection tasks and the event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::network::BoxError> {
//!     let server = Server::bind("0.0.0.0:9090")
//!         .await?
//!         .with_stats_interval(Duration::from_secs(30));
//!
//!     // Accepts WebSocket clients until the process is stopped
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod matchmaking;
pub mod network;
pub mod relay;
pub mod room;
pub mod room_store;
pub mod utils;
