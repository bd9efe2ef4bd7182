//! TCP relay server
//!
//! Accepts peer connections, frames relay messages over them, and feeds the
//! channel registry.

pub mod config;
mod connection;
pub mod listener;
pub mod peers;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use peers::PeerTable;
