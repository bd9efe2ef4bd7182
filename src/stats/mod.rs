//! Channel and relay statistics

pub mod metrics;

pub use metrics::{ChannelStats, RelayStats};
