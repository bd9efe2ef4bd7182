//! # relay-rs
//!
//! A channel relay for multi-party protocols such as distributed key
//! generation and threshold signing. Peers that cannot reach each other
//! directly meet in named channels on the relay and broadcast opaque blobs to
//! the other participants. The relay manages membership and fan-out only; it
//! never looks inside a blob.
//!
//! Each active channel is an actor task owning its participant set. The
//! [`ChannelRegistry`] maps channel ids to those actors, creates channels on
//! first join and enforces the capacity limits of [`RegistryConfig`].
//!
//! The registry talks to peers through a [`Transport`]. Two are provided:
//! [`MemoryTransport`] for in-process peers and [`RelayServer`], which frames
//! messages over TCP. Peers reach a TCP relay through [`RelayChannel`].
//!
//! ```no_run
//! use relay_rs::{RelayServer, ServerConfig};
//!
//! # async fn example() -> relay_rs::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
pub mod transport;

pub use client::RelayChannel;
pub use error::{Error, Result};
pub use protocol::{JoinResponse, JoinStatus, MessageBody, RelayMessage};
pub use registry::{ChannelRegistry, RegistryConfig, RegistryError};
pub use server::{RelayServer, ServerConfig};
pub use stats::{ChannelStats, RelayStats};
pub use transport::{Address, MemoryTransport, Transport, TransportEvent};
