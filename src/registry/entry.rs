//! Channel handle and mailbox events
//!
//! The registry keeps one [`ChannelHandle`] per active channel. The handle is
//! the only way into the channel's actor: events go through its bounded
//! mailbox, and the stop signal through a separate watch channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};

use super::error::RegistryError;
use crate::stats::ChannelStats;
use crate::transport::Address;

/// Lifecycle of a channel actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChannelState {
    /// Processing mailbox events
    Running,
    /// Stop signal received, exiting without draining
    Stopping,
    /// Loop exited
    Terminated,
}

/// Event in a channel's mailbox
#[derive(Debug)]
pub(super) enum ChannelEvent {
    Join(Address),
    Leave(Address),
    Ingress(Address, Bytes),
    Stats(oneshot::Sender<ChannelStats>),
}

/// Registry-side handle to a channel actor
#[derive(Debug)]
pub(super) struct ChannelHandle {
    id: String,
    /// Distinguishes successive channels that reuse the same id
    instance: u64,
    mailbox: mpsc::Sender<ChannelEvent>,
    stop: watch::Sender<bool>,
    done: Arc<AtomicBool>,
}

impl ChannelHandle {
    pub(super) fn new(
        id: String,
        instance: u64,
        mailbox: mpsc::Sender<ChannelEvent>,
        stop: watch::Sender<bool>,
        done: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            instance,
            mailbox,
            stop,
            done,
        }
    }

    pub(super) fn instance(&self) -> u64 {
        self.instance
    }

    /// Whether the actor has begun or finished shutting down
    #[cfg(test)]
    pub(super) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Enqueue an event without waiting for mailbox space
    pub(super) fn try_deliver(&self, event: ChannelEvent) -> Result<(), RegistryError> {
        self.mailbox.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RegistryError::MailboxFull,
            mpsc::error::TrySendError::Closed(_) => RegistryError::Closed,
        })
    }

    /// A sender for events that must wait for mailbox space
    pub(super) fn mailbox(&self) -> mpsc::Sender<ChannelEvent> {
        self.mailbox.clone()
    }

    /// Signal the actor to stop. Stopping a done channel is a no-op.
    pub(super) fn stop(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        // The actor may already be gone; nothing to signal then
        let _ = self.stop.send(true);
        tracing::debug!(channel = %self.id, instance = self.instance, "Channel stop requested");
    }

    pub(super) fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }
}
