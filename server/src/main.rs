use clap::Parser;
use log::info;
use server::network::{BoxError, Server};
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then runs the relay server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, env = "PORT", default_value_t = shared::DEFAULT_PORT)]
        port: u16,
        /// Seconds between statistics log lines (debug level, 0 disables)
        #[clap(long, default_value = "30")]
        stats_interval: u64,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address)
        .await?
        .with_stats_interval(Duration::from_secs(args.stats_interval));

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
