//! Transport boundary
//!
//! The registry only needs two things from the outside world: a way to push
//! a message to a peer, and a feed of what peers send and when they go away.

pub mod memory;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::TransportError;
use crate::protocol::RelayMessage;

pub use memory::{MemoryPeer, MemoryTransport};

/// Address of a peer as known to the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Arc<str>);

impl Address {
    pub fn new(addr: impl Into<Arc<str>>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for Address {
    fn from(addr: String) -> Self {
        Self::new(addr)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.to_string())
    }
}

/// Outbound side of a transport.
///
/// `send` is best-effort and must not block: callers log a failure and move
/// on, they never retry.
pub trait Transport: Send + Sync + 'static {
    /// Push `message` to the peer at `to`
    fn send(&self, to: &Address, message: RelayMessage) -> Result<(), TransportError>;

    /// Stop the transport. Called once by the registry on shutdown.
    fn shutdown(&self) {}
}

/// Inbound event raised by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer sent a relay message
    Message { from: Address, message: RelayMessage },
    /// The connection to a peer was lost
    Disconnected(Address),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_conversions() {
        let sock: SocketAddr = "127.0.0.1:7700".parse().unwrap();
        assert_eq!(Address::from(sock).as_str(), "127.0.0.1:7700");
        assert_eq!(Address::from("alice"), Address::from(String::from("alice")));
        assert_eq!(Address::from("bob").to_string(), "bob");
    }
}
