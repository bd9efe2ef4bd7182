//! Statistics for channels and the relay

use std::time::Duration;

use crate::transport::Address;

/// Snapshot of one channel, taken by its actor
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Channel id
    pub id: String,
    /// Current participants, sorted
    pub members: Vec<Address>,
    /// Broadcasts accepted from participants
    pub broadcasts: u64,
    /// Egress messages handed to the transport
    pub egress_sent: u64,
    /// Sends the transport refused
    pub send_failures: u64,
    /// Broadcasts dropped because the sender was not a participant
    pub dropped_ingress: u64,
    /// Time since the channel was created
    pub uptime: Duration,
}

impl ChannelStats {
    /// Number of participants
    pub fn participants(&self) -> usize {
        self.members.len()
    }

    /// Check whether `addr` is a participant
    pub fn is_member(&self, addr: &Address) -> bool {
        self.members.binary_search(addr).is_ok()
    }
}

/// Relay-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Channels currently active
    pub active_channels: usize,
    /// Channels ever created
    pub channels_created: u64,
    /// Channels removed after emptying
    pub channels_removed: u64,
    /// Joins answered with a failure by the registry
    pub joins_rejected: u64,
    /// Inbound messages the registry dropped
    pub messages_dropped: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_stats_new() {
        let stats = RelayStats::new();
        assert_eq!(stats.active_channels, 0);
        assert_eq!(stats.channels_created, 0);
        assert_eq!(stats.channels_removed, 0);
        assert_eq!(stats.joins_rejected, 0);
        assert_eq!(stats.messages_dropped, 0);
    }

    #[test]
    fn test_channel_stats_membership() {
        let stats = ChannelStats {
            id: "room".to_string(),
            members: vec![Address::from("alice"), Address::from("bob")],
            broadcasts: 0,
            egress_sent: 0,
            send_failures: 0,
            dropped_ingress: 0,
            uptime: Duration::ZERO,
        };

        assert_eq!(stats.participants(), 2);
        assert!(stats.is_member(&Address::from("bob")));
        assert!(!stats.is_member(&Address::from("carol")));
    }
}
