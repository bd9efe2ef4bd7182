//! Channel registry
//!
//! The registry owns the table of active channels and routes inbound
//! transport events to them. Each channel is an actor task with its own
//! mailbox; the registry only holds a handle to it.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<ChannelRegistry<T>>
//!                 ┌──────────────────────────────┐
//!   transport ───►│ channels: HashMap<id,        │
//!   events        │   ChannelHandle {            │
//!                 │     mailbox: mpsc::Sender,   │
//!                 │     stop: watch::Sender,     │
//!                 │   }                          │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!   [ChannelActor]        [ChannelActor]        [ChannelActor]
//!   participants          participants          participants
//!          │                     │                     │
//!          └────────► transport.send(EGRESS / JOIN_RESPONSE)
//! ```
//!
//! Actors hold a `Weak` reference back to the registry, used only to remove
//! themselves once their last participant leaves.

mod actor;
pub mod config;
mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use store::ChannelRegistry;
