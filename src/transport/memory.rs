//! In-process transport
//!
//! Peers live in the same process as the relay and talk to it over tokio
//! channels. Handy for tests and for embedding the relay next to its peers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Address, Transport, TransportEvent};
use crate::error::TransportError;
use crate::protocol::RelayMessage;

/// Default depth of the inbound event queue
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Transport whose peers are in-memory channel endpoints
pub struct MemoryTransport {
    peers: Mutex<HashMap<Address, mpsc::UnboundedSender<RelayMessage>>>,
    events: mpsc::Sender<TransportEvent>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Create a transport and the event feed to hand to the registry
    pub fn new() -> (Arc<Self>, mpsc::Receiver<TransportEvent>) {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> (Arc<Self>, mpsc::Receiver<TransportEvent>) {
        let (events, rx) = mpsc::channel(capacity.max(1));
        let transport = Arc::new(Self {
            peers: Mutex::new(HashMap::new()),
            events,
            closed: AtomicBool::new(false),
        });
        (transport, rx)
    }

    /// Register a peer and get its endpoint.
    ///
    /// Connecting an address twice replaces the previous endpoint.
    pub fn connect(&self, addr: impl Into<Address>) -> MemoryPeer {
        let addr = addr.into();
        let (tx, inbox) = mpsc::unbounded_channel();
        self.peers.lock().insert(addr.clone(), tx);

        tracing::debug!(peer = %addr, "Memory peer connected");

        MemoryPeer {
            addr,
            inbox,
            events: self.events.clone(),
        }
    }

    /// Drop a peer and raise a disconnect event for it.
    ///
    /// Returns false if the address was not connected.
    pub fn disconnect(&self, addr: &Address) -> bool {
        if self.peers.lock().remove(addr).is_none() {
            return false;
        }

        tracing::debug!(peer = %addr, "Memory peer disconnected");
        if let Err(e) = self
            .events
            .try_send(TransportEvent::Disconnected(addr.clone()))
        {
            tracing::warn!(peer = %addr, error = %e, "Failed to raise disconnect event");
        }
        true
    }

    /// Number of connected peers
    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, to: &Address, message: RelayMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let peers = self.peers.lock();
        let tx = peers
            .get(to)
            .ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;
        tx.send(message)
            .map_err(|_| TransportError::PeerGone(to.clone()))
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.peers.lock().clear();
        tracing::debug!("Memory transport shut down");
    }
}

/// A peer's end of a [`MemoryTransport`]
pub struct MemoryPeer {
    addr: Address,
    inbox: mpsc::UnboundedReceiver<RelayMessage>,
    events: mpsc::Sender<TransportEvent>,
}

impl MemoryPeer {
    pub fn address(&self) -> &Address {
        &self.addr
    }

    /// Send a message to the relay
    pub async fn send(&self, message: RelayMessage) -> Result<(), TransportError> {
        self.events
            .send(TransportEvent::Message {
                from: self.addr.clone(),
                message,
            })
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Wait for the next message from the relay.
    ///
    /// Returns `None` once the transport dropped this peer.
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        self.inbox.recv().await
    }

    /// Take a message from the relay if one is already waiting
    pub fn try_recv(&mut self) -> Option<RelayMessage> {
        self.inbox.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_connected_peer() {
        let (transport, _events) = MemoryTransport::new();
        let mut alice = transport.connect("alice");

        transport
            .send(&Address::from("alice"), RelayMessage::join("room"))
            .unwrap();

        assert_eq!(alice.recv().await, Some(RelayMessage::join("room")));
        assert!(alice.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_send_failures() {
        let (transport, _events) = MemoryTransport::new();

        let err = transport
            .send(&Address::from("nobody"), RelayMessage::leave("room"))
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownPeer(Address::from("nobody")));

        drop(transport.connect("gone"));
        let err = transport
            .send(&Address::from("gone"), RelayMessage::leave("room"))
            .unwrap_err();
        assert_eq!(err, TransportError::PeerGone(Address::from("gone")));
    }

    #[tokio::test]
    async fn test_peer_messages_become_events() {
        let (transport, mut events) = MemoryTransport::new();
        let alice = transport.connect("alice");

        alice.send(RelayMessage::join("room")).await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Message {
                from: Address::from("alice"),
                message: RelayMessage::join("room"),
            })
        );
    }

    #[tokio::test]
    async fn test_disconnect_raises_event_once() {
        let (transport, mut events) = MemoryTransport::new();
        let _alice = transport.connect("alice");
        let addr = Address::from("alice");

        assert!(transport.disconnect(&addr));
        assert!(!transport.disconnect(&addr));
        assert_eq!(transport.peer_count(), 0);
        assert_eq!(events.recv().await, Some(TransportEvent::Disconnected(addr)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_peers() {
        let (transport, _events) = MemoryTransport::new();
        let mut alice = transport.connect("alice");

        transport.shutdown();

        assert!(transport.is_closed());
        assert_eq!(alice.recv().await, None);
        assert_eq!(
            transport.send(&Address::from("alice"), RelayMessage::join("room")),
            Err(TransportError::Closed)
        );
    }
}
