//! Error types
//!
//! Each concern has its own error enum; [`Error`] gathers them for the
//! fallible entry points of the server.

use std::io;

use thiserror::Error;

pub use crate::registry::RegistryError;
use crate::transport::Address;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The relay answered a join with a failure
    #[error("join rejected: {0}")]
    JoinRejected(String),

    #[error("connection closed by relay")]
    ConnectionClosed,
}

/// Wire codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Declared frame length exceeds the configured maximum
    #[error("frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Complete frame with a tag this relay does not know
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),

    /// Frame ended before a field was complete
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    #[error("invalid UTF-8 in frame")]
    InvalidUtf8,
}

impl ProtocolError {
    /// Whether the byte stream can no longer be trusted after this error.
    ///
    /// Every other variant is raised after the offending frame has been
    /// consumed, so the reader can carry on with the next one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::FrameTooLarge { .. })
    }
}

/// Errors returned by [`Transport::send`](crate::transport::Transport::send)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("unknown peer {0}")]
    UnknownPeer(Address),

    #[error("peer {0} is gone")]
    PeerGone(Address),

    #[error("outbound queue for {0} is full")]
    QueueFull(Address),

    #[error("transport closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_oversize_frames_are_fatal() {
        assert!(ProtocolError::FrameTooLarge { size: 10, max: 5 }.is_fatal());
        assert!(!ProtocolError::UnknownMessageType(0x7f).is_fatal());
        assert!(!ProtocolError::Malformed("channel").is_fatal());
        assert!(!ProtocolError::InvalidUtf8.is_fatal());
    }

    #[test]
    fn test_from_conversions() {
        let err: Error = TransportError::Closed.into();
        assert!(matches!(err, Error::Transport(TransportError::Closed)));

        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_join_rejected_carries_reason() {
        let err = Error::JoinRejected("too many channels".into());
        assert_eq!(err.to_string(), "join rejected: too many channels");
    }
}
