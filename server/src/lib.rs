//! # Glass Plate Game Server
//!
//! Authoritative server for the Glass Plate Game. It owns the board, runs
//! the handshake with every player and relays chat, nickname changes and
//! die placements to everyone who is playing.
//!
//! ## Architecture
//!
//! ### Single Core Task
//! One task owns all shared state: the board, the session registry and the
//! nickname table. It reacts to new connections, bridge notifications, a
//! poll tick and the shutdown signal, then processes every session's
//! pending events in slot order. Nothing else mutates game state, so no
//! locks are involved.
//!
//! ### One Bridge Per Connection
//! Each socket is owned by a bridge task ([`bridge`]). The bridge decodes
//! whole packets and forwards them to the core over a bounded channel, and
//! writes whatever the core queues for its session. The core only ever
//! queues without waiting; a session whose queue is full is killed rather
//! than allowed to stall everyone else.
//!
//! ### Session Lifecycle
//! Sessions move forward only ([`session`]): version check, nickname,
//! board sync, then play. Killing a session closes its outbound queue;
//! the bridge flushes what is left and exits, after which the core reaps
//! the slot and tells the other players.
//!
//! ## Module Organization
//!
//! - [`config`]: tunables and their validation.
//! - [`bridge`]: socket-facing task and its channels.
//! - [`session`]: per-player state and the slot registry.
//! - [`game`]: board authority and placement rules.
//! - [`network`]: the core loop and packet handlers.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:13500".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::bind(config).await?;
//!     // serves until Ctrl-C, then tells every player and closes
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod game;
pub mod network;
pub mod session;

pub use config::{ConfigError, ServerConfig};
pub use network::{Server, ServerError};
