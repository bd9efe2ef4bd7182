//! Connected peer table
//!
//! Maps each connected socket's address to its outbound queue. This is the
//! [`Transport`] the registry sends through when running over TCP.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::error::TransportError;
use crate::protocol::RelayMessage;
use crate::transport::{Address, Transport};

/// Outbound queues of connected peers
pub struct PeerTable {
    peers: Mutex<HashMap<Address, mpsc::Sender<RelayMessage>>>,
    closed: watch::Sender<bool>,
}

impl PeerTable {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            peers: Mutex::new(HashMap::new()),
            closed,
        }
    }

    /// Register a peer's outbound queue
    pub(super) fn register(&self, addr: Address, outbound: mpsc::Sender<RelayMessage>) {
        self.peers.lock().insert(addr, outbound);
    }

    /// Forget a peer. Dropping its queue lets the writer finish.
    pub(super) fn unregister(&self, addr: &Address) -> bool {
        self.peers.lock().remove(addr).is_some()
    }

    /// Watch for transport shutdown
    pub(super) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.peers.lock().contains_key(addr)
    }

    /// Number of connected peers
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for PeerTable {
    fn send(&self, to: &Address, message: RelayMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let peers = self.peers.lock();
        let outbound = peers
            .get(to)
            .ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;
        outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull(to.clone()),
            mpsc::error::TrySendError::Closed(_) => TransportError::PeerGone(to.clone()),
        })
    }

    fn shutdown(&self) {
        self.closed.send_replace(true);
        let dropped = {
            let mut peers = self.peers.lock();
            let count = peers.len();
            peers.clear();
            count
        };
        tracing::debug!(peers = dropped, "Peer table closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_registered_peer() {
        let table = PeerTable::new();
        let addr = Address::from("127.0.0.1:5000");
        let (tx, mut rx) = mpsc::channel(1);
        table.register(addr.clone(), tx);

        table.send(&addr, RelayMessage::join("room")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), RelayMessage::join("room"));
    }

    #[test]
    fn test_send_errors() {
        let table = PeerTable::new();
        let addr = Address::from("127.0.0.1:5000");

        assert_eq!(
            table.send(&addr, RelayMessage::leave("room")),
            Err(TransportError::UnknownPeer(addr.clone()))
        );

        let (tx, rx) = mpsc::channel(1);
        table.register(addr.clone(), tx);
        table.send(&addr, RelayMessage::leave("room")).unwrap();
        assert_eq!(
            table.send(&addr, RelayMessage::leave("room")),
            Err(TransportError::QueueFull(addr.clone()))
        );

        drop(rx);
        assert_eq!(
            table.send(&addr, RelayMessage::leave("room")),
            Err(TransportError::PeerGone(addr.clone()))
        );
    }

    #[test]
    fn test_shutdown_clears_and_signals() {
        let table = PeerTable::new();
        let signal = table.closed_signal();
        let (tx, _rx) = mpsc::channel(1);
        table.register(Address::from("a"), tx);

        table.shutdown();

        assert!(table.is_empty());
        assert!(table.is_closed());
        assert!(*signal.borrow());
        assert_eq!(
            table.send(&Address::from("a"), RelayMessage::join("room")),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_unregister() {
        let table = PeerTable::new();
        let (tx, _rx) = mpsc::channel(1);
        table.register(Address::from("a"), tx);

        assert!(table.contains(&Address::from("a")));
        assert!(table.unregister(&Address::from("a")));
        assert!(!table.unregister(&Address::from("a")));
    }
}
