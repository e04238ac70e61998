use clap::Parser;
use client::network::{Client, ClientError};
use log::{info, warn};
use shared::{DEFAULT_PORT, PROTOCOL_VERSION};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Nickname to play under
    #[arg(short = 'n', long, default_value = "knecht")]
    nick: String,

    /// Protocol version to offer
    #[arg(long = "proto", default_value = PROTOCOL_VERSION)]
    protocol_version: String,

    /// Attempts at finding a free nickname before giving up
    #[arg(long, default_value = "3")]
    nick_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut client = Client::connect(&args.server).await?;
    client
        .negotiate(&args.protocol_version, "gls")
        .await?;

    // a taken nickname gets a numeric suffix and another try
    let mut attempt = 0;
    loop {
        let nick = if attempt == 0 {
            args.nick.clone()
        } else {
            format!("{}{}", args.nick, attempt)
        };
        match client.join(&nick).await {
            Ok(()) => break,
            Err(ClientError::NickRejected(reason)) if attempt + 1 < args.nick_attempts => {
                warn!("Nickname '{}' rejected: {}", nick, reason);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Type 'help' for a list of commands");
    client.run().await?;

    Ok(())
}
