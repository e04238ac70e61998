//! Server configuration and its validation.

use shared::packet::{self, MOTD_LENGTH};
use shared::{
    ProtocolError, BOARD_COLUMNS, BOARD_ROWS, DEFAULT_DICE, DEFAULT_PORT, MAX_DICE,
    MAX_PACKET_LENGTH,
};
use std::time::Duration;
use thiserror::Error;

/// Bytes a session may have queued before it counts as not keeping up.
const SEND_QUEUE_BYTES: usize = 65536;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max players must be at least 1")]
    NoPlayers,
    #[error("dice pool must hold at least 1 die")]
    NoDice,
    #[error("dice pool of {0} exceeds the limit of {}", MAX_DICE)]
    TooManyDice(usize),
    #[error("send queue of {queue} packets cannot hold a full board sync of {needed}")]
    SendQueueTooSmall { queue: usize, needed: usize },
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),
    #[error("bad protocol version: {0}")]
    Version(ProtocolError),
    #[error("bad software identifier: {0}")]
    Software(ProtocolError),
    #[error("bad message of the day: {0}")]
    Motd(ProtocolError),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Session slots; connections past this are turned away.
    pub max_players: usize,
    pub dice: usize,
    pub motd: String,
    /// Version string a client must offer exactly.
    pub version: String,
    pub software: String,
    /// How long a bridge waits on an idle socket before looping.
    pub read_timeout: Duration,
    /// Upper bound on the core loop's sleep between wake-ups.
    pub poll_interval: Duration,
    /// Whole packets queued per session towards its socket.
    pub send_queue: usize,
    /// How long a killed bridge may take to flush before it is aborted.
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_players: 64,
            dice: DEFAULT_DICE,
            motd: "Welcome to the Glass Plate Game".to_string(),
            version: shared::PROTOCOL_VERSION.to_string(),
            software: "glsd".to_string(),
            read_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            send_queue: SEND_QUEUE_BYTES / MAX_PACKET_LENGTH,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Packets a session may have queued by the end of its handshake: the
    /// version ack, the nickname assignment, one per cell, one per die and
    /// the end marker.
    pub fn sync_len(&self) -> usize {
        2 + BOARD_ROWS * BOARD_COLUMNS + self.dice + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 {
            return Err(ConfigError::NoPlayers);
        }
        if self.dice == 0 {
            return Err(ConfigError::NoDice);
        }
        if self.dice > MAX_DICE {
            return Err(ConfigError::TooManyDice(self.dice));
        }
        if self.send_queue < self.sync_len() {
            return Err(ConfigError::SendQueueTooSmall {
                queue: self.send_queue,
                needed: self.sync_len(),
            });
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("read timeout"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        packet::validate_version(&self.version).map_err(ConfigError::Version)?;
        packet::validate_software(&self.software).map_err(ConfigError::Software)?;
        packet::validate_text("motd", &self.motd, MOTD_LENGTH).map_err(ConfigError::Motd)?;
        Ok(())
    }
}
