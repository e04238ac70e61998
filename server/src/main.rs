use clap::Parser;
use log::{error, info};
use server::{Server, ServerConfig};
use shared::{DEFAULT_DICE, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "64")]
    max_players: usize,

    /// Dice in the shared pool
    #[arg(short, long, default_value_t = DEFAULT_DICE)]
    dice: usize,

    /// Message of the day sent at the end of every board sync
    #[arg(long)]
    motd: Option<String>,

    /// Core loop poll interval in milliseconds
    #[arg(long, default_value = "10")]
    poll_ms: u64,
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Received termination signal");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_players: args.max_players,
        dice: args.dice,
        motd: args.motd.unwrap_or(defaults.motd.clone()),
        poll_interval: Duration::from_millis(args.poll_ms),
        ..defaults
    };

    info!("Starting server...");
    info!("Players: {}, dice: {}", config.max_players, config.dice);

    let mut server = Server::bind(config).await?;
    server.run_until(shutdown_signal()).await?;

    Ok(())
}
