//! Relay client
//!
//! Peer-side access to a relay: join a channel over TCP, broadcast blobs to
//! the other participants and receive theirs.

pub mod channel;

pub use channel::RelayChannel;
