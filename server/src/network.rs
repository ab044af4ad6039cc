//! Server network layer handling WebSocket connections and event-loop coordination

use crate::client_manager::{outbound_channel, ConnectionId, OutboundSender};
use crate::relay::Relay;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the event loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        connection: ConnectionId,
        addr: SocketAddr,
        sender: OutboundSender,
    },
    Message {
        connection: ConnectionId,
        text: String,
    },
    Disconnected {
        connection: ConnectionId,
    },
}

/// WebSocket relay server
///
/// Connection tasks only move frames; every state change happens on the
/// single event loop that owns the [`Relay`].
pub struct Server {
    listener: TcpListener,
    stats_interval: Option<Duration>,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            stats_interval: None,
        })
    }

    /// Logs connection/room/queue counts at debug level every `every`; zero disables
    pub fn with_stats_interval(mut self, every: Duration) -> Self {
        self.stats_interval = (!every.is_zero()).then_some(every);
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, feeding their traffic to the event loop
    pub async fn run(self) -> Result<(), BoxError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_event_loop(event_rx, self.stats_interval));

        info!("Server started successfully");

        let mut next_connection = 0u64;
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            next_connection += 1;
            let connection = ConnectionId(next_connection);
            let event_tx = event_tx.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, connection, event_tx).await {
                    warn!("Connection {} from {} failed: {}", connection, addr, e);
                }
            });
        }
    }
}

/// Owns the relay state and applies events strictly in arrival order
pub async fn run_event_loop(
    mut event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    stats_interval: Option<Duration>,
) {
    let mut relay = Relay::new();
    let mut stats_timer = stats_interval.map(|every| {
        let mut timer = interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    });

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(NetworkEvent::Connected { connection, addr, sender }) => {
                        relay.handle_connect(connection, addr, sender);
                    }
                    Some(NetworkEvent::Message { connection, text }) => {
                        relay.handle_message(connection, &text);
                    }
                    Some(NetworkEvent::Disconnected { connection }) => {
                        relay.handle_disconnect(connection);
                    }
                    None => {
                        info!("Event loop shutting down");
                        break;
                    }
                }
            },

            // Periodic monitoring
            _ = async {
                match stats_timer.as_mut() {
                    Some(timer) => timer.tick().await,
                    None => std::future::pending().await,
                }
            } => {
                let stats = relay.stats();
                debug!(
                    "{} connections, {} rooms, {} waiting for a match",
                    stats.connections, stats.rooms, stats.queued
                );
            },
        }
    }
}

/// Runs one WebSocket connection: handshake, writer task, then the read loop
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection: ConnectionId,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    debug!("WebSocket handshake with {} done ({})", addr, connection);

    let (out_tx, mut out_rx) = outbound_channel();
    event_tx.send(NetworkEvent::Connected {
        connection,
        addr,
        sender: out_tx,
    })?;

    // Ends when the relay drops the sender or the socket stops accepting
    // writes; either way the relay then sees this connection as closed.
    tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                debug!("Write to {} failed: {}", connection, e);
                break;
            }
        }
        out_rx.close();
        let _ = ws_sender.close().await;
    });

    while let Some(frame) = ws_receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Dropping non-UTF-8 binary frame from {}", connection);
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Read from {} failed: {}", connection, e);
                break;
            }
        };

        if event_tx
            .send(NetworkEvent::Message { connection, text })
            .is_err()
        {
            error!("Event loop is gone, closing {}", connection);
            break;
        }
    }

    event_tx.send(NetworkEvent::Disconnected { connection })?;
    Ok(())
}
