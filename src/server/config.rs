//! Server configuration

use std::net::SocketAddr;

use crate::protocol::constants::MAX_FRAME_SIZE;

/// Default TCP port of the relay
pub const DEFAULT_PORT: u16 = 7700;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Outbound frames queued per peer before sends start failing
    pub peer_queue_size: usize,

    /// Inbound events queued between connections and the registry
    pub event_queue_size: usize,

    /// Largest frame accepted from a peer
    pub max_frame_size: usize,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            peer_queue_size: 256,
            event_queue_size: 1024,
            max_frame_size: MAX_FRAME_SIZE,
            read_buffer_size: 16 * 1024,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-peer outbound queue size (at least 1)
    pub fn peer_queue_size(mut self, size: usize) -> Self {
        self.peer_queue_size = size.max(1);
        self
    }

    /// Set the inbound event queue size (at least 1)
    pub fn event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size.max(1);
        self
    }

    /// Set the largest accepted frame
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}
