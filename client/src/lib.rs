//! # Glass Plate Game Client
//!
//! Terminal client for the Glass Plate Game. It performs the handshake,
//! keeps a mirror of the server's board and turns typed commands into
//! protocol packets.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The protocol driver:
//! - Version negotiation and nickname request, with retry on rejection
//! - Reading the board sync up to its end marker
//! - The interactive loop, with a reader task feeding server events
//!
//! ### Game Module (`game`)
//! The board mirror, updated from plate and die packets, plus the roster of
//! other players.
//!
//! ### Input Module (`input`)
//! Parses command lines: `board`, `plate <loc>`, `place <loc> [color]`,
//! `nick <name>`, `say <text>`, `players`, `help` and `quit`.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text board grid, plate details and one-line event notices.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:13500").await?;
//!     client.negotiate(shared::PROTOCOL_VERSION, "gls").await?;
//!     client.join("knecht").await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
