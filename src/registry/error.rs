//! Registry error types
//!
//! Failures a peer can hit when joining or talking to a channel.

use thiserror::Error;

/// Registry and channel errors.
///
/// The `Display` text is what peers see as the reason of a failed join.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("channel: can't join a full channel")]
    ChannelFull,

    #[error("too many channels")]
    TooManyChannels,

    #[error("channel: mailbox full")]
    MailboxFull,

    #[error("relay message without a channel id")]
    EmptyChannelId,

    /// LEAVE or INGRESS for a channel that does not exist
    #[error("no such channel")]
    UnknownChannel,

    /// A relay-to-peer message arrived from a peer
    #[error("unexpected {0} message")]
    UnexpectedMessage(&'static str),

    #[error("relay closed")]
    Closed,
}
