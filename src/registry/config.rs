//! Registry configuration

use crate::protocol::constants::*;

/// Channel capacity policy
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum participants per channel
    pub channel_size: usize,

    /// Maximum channels active at once
    pub max_channels: usize,

    /// Depth of each channel's mailbox
    pub mailbox_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_size: DEFAULT_CHANNEL_SIZE,
            max_channels: DEFAULT_MAX_CHANNELS,
            mailbox_capacity: DEFAULT_CHANNEL_QUEUE_SIZE,
        }
    }
}

impl RegistryConfig {
    /// Set the maximum participants per channel
    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size;
        self
    }

    /// Set the maximum number of active channels
    pub fn max_channels(mut self, max: usize) -> Self {
        self.max_channels = max;
        self
    }

    /// Set the mailbox depth (at least 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}
