//! Protocol error taxonomy shared by the codec, the transport helpers and
//! both ends of a connection.

use std::io;
use thiserror::Error;

/// Broad class of a [`ProtocolError`], used by callers to decide whether a
/// connection survives the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Short read/write, unknown discriminant or clean close. Always fatal
    /// to the connection.
    Framing,
    /// A field violated its domain rule. The payload was fully consumed, so
    /// the stream is still in sync.
    Validation,
    /// The operating system reported an error on the socket.
    System,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("connection closed")]
    Closed,

    #[error("unknown event type: {0:#010x}")]
    UnknownEvent(u32),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    pub fn invalid(field: &'static str, reason: &'static str) -> Self {
        ProtocolError::Invalid { field, reason }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::ShortRead { .. }
            | ProtocolError::ShortWrite { .. }
            | ProtocolError::Closed
            | ProtocolError::UnknownEvent(_) => ErrorKind::Framing,
            ProtocolError::Invalid { .. } => ErrorKind::Validation,
            ProtocolError::Io(_) => ErrorKind::System,
        }
    }

    /// True when the stream can no longer be trusted to sit on a packet
    /// boundary.
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::Validation
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
