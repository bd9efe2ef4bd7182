//! Protocol constants and relay policy defaults

/// Maximum number of participants in a channel
pub const DEFAULT_CHANNEL_SIZE: usize = 30;

/// Maximum number of channels a relay keeps active at once
pub const DEFAULT_MAX_CHANNELS: usize = 50;

/// Depth of a channel's mailbox
pub const DEFAULT_CHANNEL_QUEUE_SIZE: usize = 100;

/// Size of the big-endian length prefix of a frame
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Largest frame accepted by default (length prefix excluded)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

// Message type tags
pub const TAG_JOIN: u8 = 0x01;
pub const TAG_LEAVE: u8 = 0x02;
pub const TAG_INGRESS: u8 = 0x03;
pub const TAG_EGRESS: u8 = 0x04;
pub const TAG_JOIN_RESPONSE: u8 = 0x05;

// Join response status codes
pub const STATUS_OK: u8 = 0x00;
pub const STATUS_FAILURE: u8 = 0x01;
