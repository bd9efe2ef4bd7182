//! Relay protocol
//!
//! The message vocabulary exchanged between peers and the relay, and the
//! binary framing used when that vocabulary travels over a byte stream.

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{encode, encode_to_bytes, FrameDecoder};
pub use message::{JoinResponse, JoinStatus, MessageBody, RelayMessage};
