use clap::{Parser, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Anonymous matchmaking
    Match,
    /// Create a room (with --code, or a generated one)
    Create,
    /// Join the room given by --code
    Join,
}

/// Scripted client for smoke-testing a running relay server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server WebSocket URL
    #[clap(long, default_value = "ws://127.0.0.1:9090")]
    url: String,
    /// How to get into a room
    #[clap(long, value_enum, default_value = "match")]
    mode: Mode,
    /// Room code for create/join
    #[clap(long)]
    code: Option<String>,
    /// Number of state updates to send once the game starts
    #[clap(long, default_value = "10")]
    updates: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (ws, _) = connect_async(args.url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();
    info!("Connected to {}", args.url);

    let request = match args.mode {
        Mode::Match => json!({"type": "find_match"}),
        Mode::Create => json!({"type": "create_room", "code": args.code}),
        Mode::Join => json!({"type": "join_room", "code": args.code}),
    };
    sink.send(Message::Text(request.to_string())).await?;

    let mut my_id = None;
    let mut started = false;

    // Print everything the server says; mark ready once seated, then stream
    // positions after the game starts.
    loop {
        let frame = match timeout(Duration::from_secs(30), stream.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(_) => {
                warn!("No message for 30s, giving up");
                break;
            }
        };
        let Message::Text(text) = frame else {
            continue;
        };
        let message: Value = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unparseable message {:?}: {}", text, e);
                continue;
            }
        };
        info!("<- {}", message);

        match message["type"].as_str() {
            Some("welcome") => my_id = message["id"].as_str().map(str::to_string),
            Some("room_joined") | Some("room_created") => {
                info!("Seated as {:?} in room {}", my_id, message["code"]);
                sink.send(Message::Text(json!({"type": "ready"}).to_string()))
                    .await?;
            }
            Some("start_game") if !started => {
                started = true;
                for i in 0..args.updates {
                    let x = (i as f64 / 5.0).sin() * 100.0;
                    let y = (i as f64 / 5.0).cos() * 100.0;
                    let update = json!({"type": "state", "x": x, "y": y});
                    info!("-> {}", update);
                    sink.send(Message::Text(update.to_string())).await?;
                    sleep(Duration::from_millis(100)).await;
                }
                sink.send(Message::Text(
                    json!({"type": "game", "event": "done"}).to_string(),
                ))
                .await?;
            }
            _ => {}
        }
    }

    sink.send(Message::Close(None)).await.ok();
    info!("Test client finished");
    Ok(())
}
