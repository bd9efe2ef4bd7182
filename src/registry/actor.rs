//! Channel actor
//!
//! One task per active channel. The task owns the participant set, so nothing
//! in here needs a lock: membership only changes in response to events taken
//! off the channel's mailbox, one at a time, in arrival order.
//!
//! ```text
//!   registry.dispatch() ──try_send──► [ mailbox ] ──► ChannelActor::run()
//!   handle.stop()       ──watch────────────────────►      │
//!                                                          ├─► transport.send(JOIN_RESPONSE)
//!                                                          └─► transport.send(EGRESS) × (n - 1)
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use super::config::RegistryConfig;
use super::entry::{ChannelEvent, ChannelHandle, ChannelState};
use super::error::RegistryError;
use super::store::ChannelRegistry;
use crate::protocol::{JoinResponse, RelayMessage};
use crate::stats::ChannelStats;
use crate::transport::{Address, Transport};

/// Start the actor for a new channel and return its handle
pub(super) fn spawn<T: Transport>(
    id: &str,
    instance: u64,
    config: &RegistryConfig,
    transport: Arc<T>,
    registry: Weak<ChannelRegistry<T>>,
) -> ChannelHandle {
    let (mailbox_tx, mailbox) = mpsc::channel(config.mailbox_capacity.max(1));
    let (stop_tx, stop) = watch::channel(false);
    let done = Arc::new(AtomicBool::new(false));

    let actor = ChannelActor {
        id: id.to_string(),
        instance,
        channel_size: config.channel_size,
        participants: HashSet::new(),
        transport,
        registry,
        mailbox,
        stop,
        done: Arc::clone(&done),
        state: ChannelState::Running,
        created_at: Instant::now(),
        broadcasts: 0,
        egress_sent: 0,
        send_failures: 0,
        dropped_ingress: 0,
    };
    tokio::spawn(actor.run());

    ChannelHandle::new(id.to_string(), instance, mailbox_tx, stop_tx, done)
}

struct ChannelActor<T: Transport> {
    id: String,
    instance: u64,
    channel_size: usize,
    participants: HashSet<Address>,
    transport: Arc<T>,
    registry: Weak<ChannelRegistry<T>>,
    mailbox: mpsc::Receiver<ChannelEvent>,
    stop: watch::Receiver<bool>,
    done: Arc<AtomicBool>,
    state: ChannelState,
    created_at: Instant,
    broadcasts: u64,
    egress_sent: u64,
    send_failures: u64,
    dropped_ingress: u64,
}

impl<T: Transport> ChannelActor<T> {
    async fn run(mut self) {
        tracing::debug!(channel = %self.id, instance = self.instance, "Channel started");

        while self.state == ChannelState::Running {
            let event = tokio::select! {
                biased;

                // Also fires if the handle was dropped
                _ = self.stop.changed() => {
                    self.state = ChannelState::Stopping;
                    continue;
                }
                event = self.mailbox.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.handle(event);

            if self.participants.is_empty() && self.retire().await {
                break;
            }
        }

        let stopped = self.state == ChannelState::Stopping;
        self.state = ChannelState::Terminated;
        self.done.store(true, Ordering::Release);

        tracing::info!(
            channel = %self.id,
            instance = self.instance,
            stopped,
            broadcasts = self.broadcasts,
            "Channel terminated"
        );
    }

    fn handle(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Join(addr) => self.join(addr),
            ChannelEvent::Leave(addr) => self.leave(&addr),
            ChannelEvent::Ingress(addr, blob) => self.ingress(addr, blob),
            ChannelEvent::Stats(reply) => {
                // Requester may have given up waiting
                let _ = reply.send(self.stats());
            }
        }
    }

    fn join(&mut self, addr: Address) {
        let response = if self.participants.contains(&addr) {
            tracing::debug!(channel = %self.id, peer = %addr, "Already a participant");
            JoinResponse::ok()
        } else if self.participants.len() < self.channel_size {
            tracing::debug!(
                channel = %self.id,
                peer = %addr,
                participants = self.participants.len() + 1,
                "Participant joined"
            );
            self.participants.insert(addr.clone());
            JoinResponse::ok()
        } else {
            tracing::debug!(channel = %self.id, peer = %addr, "Refusing participant, channel full");
            JoinResponse::failure(RegistryError::ChannelFull.to_string())
        };

        let reply = RelayMessage::join_response(self.id.as_str(), response);
        if let Err(e) = self.transport.send(&addr, reply) {
            self.send_failures += 1;
            tracing::warn!(
                channel = %self.id,
                peer = %addr,
                error = %e,
                "Failed to send join response"
            );
        }
    }

    fn leave(&mut self, addr: &Address) {
        if self.participants.remove(addr) {
            tracing::debug!(
                channel = %self.id,
                peer = %addr,
                participants = self.participants.len(),
                "Participant left"
            );
        }
    }

    fn ingress(&mut self, from: Address, blob: Bytes) {
        if !self.participants.contains(&from) {
            self.dropped_ingress += 1;
            tracing::debug!(
                channel = %self.id,
                peer = %from,
                "Broadcast from unregistered sender dropped"
            );
            return;
        }

        self.broadcasts += 1;
        let egress = RelayMessage::egress(self.id.as_str(), from.clone(), blob);

        let mut sent = 0;
        let mut failed = 0;
        for participant in self.participants.iter().filter(|p| **p != from) {
            match self.transport.send(participant, egress.clone()) {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        channel = %self.id,
                        peer = %participant,
                        error = %e,
                        "Failed to forward broadcast"
                    );
                }
            }
        }

        self.egress_sent += sent;
        self.send_failures += failed;
    }

    fn stats(&self) -> ChannelStats {
        let mut members: Vec<Address> = self.participants.iter().cloned().collect();
        members.sort();

        ChannelStats {
            id: self.id.clone(),
            members,
            broadcasts: self.broadcasts,
            egress_sent: self.egress_sent,
            send_failures: self.send_failures,
            dropped_ingress: self.dropped_ingress,
            uptime: self.created_at.elapsed(),
        }
    }

    /// Try to deregister an empty channel.
    ///
    /// Fails while events are still queued; those may bring participants back.
    async fn retire(&mut self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return true;
        };
        registry
            .remove_channel(&self.id, self.instance, &mut self.mailbox)
            .await
    }
}
