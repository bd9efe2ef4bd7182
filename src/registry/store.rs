//! Channel registry implementation
//!
//! The central table of active channels. It turns inbound transport events
//! into mailbox events for the right channel actor, creating channels on
//! first join and enforcing the channel cap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};

use super::actor;
use super::config::RegistryConfig;
use super::entry::{ChannelEvent, ChannelHandle};
use super::error::RegistryError;
use crate::protocol::{JoinResponse, MessageBody, RelayMessage};
use crate::stats::{ChannelStats, RelayStats};
use crate::transport::{Address, Transport, TransportEvent};

/// Central registry for all active channels
///
/// The map lock is only held to look up, insert or remove a handle and to
/// enqueue into a mailbox, which never waits. Transport sends happen outside
/// of it.
pub struct ChannelRegistry<T: Transport> {
    /// Map of channel id to channel handle
    channels: RwLock<HashMap<String, ChannelHandle>>,

    /// Outbound side of the transport, shared with every channel
    transport: Arc<T>,

    /// Configuration
    config: RegistryConfig,

    next_instance: AtomicU64,
    closed: AtomicBool,

    channels_created: AtomicU64,
    channels_removed: AtomicU64,
    joins_rejected: AtomicU64,
    messages_dropped: AtomicU64,
}

impl<T: Transport> ChannelRegistry<T> {
    /// Create a registry with default configuration
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(transport: Arc<T>, config: RegistryConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            transport,
            config,
            next_instance: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            channels_created: AtomicU64::new(0),
            channels_removed: AtomicU64::new(0),
            joins_rejected: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Route an inbound message to its channel.
    ///
    /// Nothing is returned to the caller: rejected joins are answered through
    /// the transport, everything else that cannot be routed is logged and
    /// dropped.
    pub async fn dispatch(self: &Arc<Self>, from: Address, message: RelayMessage) {
        let RelayMessage { channel, body } = message;
        let is_join = matches!(body, MessageBody::Join);
        let kind = body.kind();

        let err = match self.route(&from, &channel, body).await {
            Ok(()) => return,
            Err(err) => err,
        };

        match err {
            RegistryError::TooManyChannels | RegistryError::MailboxFull if is_join => {
                self.joins_rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(channel = %channel, peer = %from, reason = %err, "Join rejected");

                let response = JoinResponse::failure(err.to_string());
                let reply = RelayMessage::join_response(channel.as_str(), response);
                if let Err(e) = self.transport.send(&from, reply) {
                    tracing::warn!(
                        channel = %channel,
                        peer = %from,
                        error = %e,
                        "Failed to send join response"
                    );
                }
            }
            RegistryError::UnknownChannel => {
                self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    channel = %channel,
                    peer = %from,
                    kind,
                    "Message for unknown channel dropped"
                );
            }
            _ => {
                self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    channel = %channel,
                    peer = %from,
                    kind,
                    reason = %err,
                    "Relay message dropped"
                );
            }
        }
    }

    async fn route(
        self: &Arc<Self>,
        from: &Address,
        channel: &str,
        body: MessageBody,
    ) -> Result<(), RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }
        if channel.is_empty() {
            return Err(RegistryError::EmptyChannelId);
        }

        let event = match body {
            MessageBody::Join => ChannelEvent::Join(from.clone()),
            MessageBody::Leave => return self.leave(channel, from).await,
            MessageBody::Ingress(blob) => ChannelEvent::Ingress(from.clone(), blob),
            other => return Err(RegistryError::UnexpectedMessage(other.kind())),
        };
        let is_join = matches!(event, ChannelEvent::Join(_));

        {
            let channels = self.channels.read().await;
            if let Some(handle) = channels.get(channel) {
                return handle.try_deliver(event);
            }
        }

        // Only a join creates a channel
        if !is_join {
            return Err(RegistryError::UnknownChannel);
        }

        let mut channels = self.channels.write().await;
        if let Some(handle) = channels.get(channel) {
            return handle.try_deliver(event);
        }
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }
        if channels.len() >= self.config.max_channels {
            return Err(RegistryError::TooManyChannels);
        }

        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let handle = actor::spawn(
            channel,
            instance,
            &self.config,
            Arc::clone(&self.transport),
            Arc::downgrade(self),
        );
        let delivered = handle.try_deliver(event);
        channels.insert(channel.to_string(), handle);
        self.channels_created.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            channel = %channel,
            instance = instance,
            active = channels.len(),
            "Channel created"
        );

        delivered
    }

    /// Deliver a leave to an existing channel.
    ///
    /// Unlike other events a leave is never rejected: when the mailbox is
    /// full this waits for space, outside the registry lock.
    async fn leave(&self, channel: &str, from: &Address) -> Result<(), RegistryError> {
        let mailbox = {
            let channels = self.channels.read().await;
            let handle = channels.get(channel).ok_or(RegistryError::UnknownChannel)?;
            handle.mailbox()
        };

        // A closed mailbox belongs to a retired channel, which has no members left
        let _ = mailbox.send(ChannelEvent::Leave(from.clone())).await;
        Ok(())
    }

    /// Tell every channel that `addr` is gone.
    ///
    /// Channels the address never joined treat the leave as a no-op. A full
    /// mailbox is waited on rather than skipped, so the peer cannot linger as
    /// a member.
    pub async fn on_peer_disconnected(&self, addr: &Address) {
        let mailboxes: Vec<(String, mpsc::Sender<ChannelEvent>)> = {
            let channels = self.channels.read().await;
            channels
                .iter()
                .map(|(id, handle)| (id.clone(), handle.mailbox()))
                .collect()
        };

        tracing::debug!(peer = %addr, channels = mailboxes.len(), "Peer disconnected");

        for (id, mailbox) in mailboxes {
            if mailbox.send(ChannelEvent::Leave(addr.clone())).await.is_err() {
                tracing::debug!(channel = %id, peer = %addr, "Channel retired before disconnect");
            }
        }
    }

    /// Deregister a channel whose participant set emptied.
    ///
    /// Called by the channel's own actor. Refuses while `mailbox` still holds
    /// events; once it agrees, the mailbox is closed under the registry lock,
    /// so no event can slip into a retired channel. Only removes the entry if
    /// it still belongs to `instance`, which makes repeated calls harmless.
    pub(super) async fn remove_channel(
        &self,
        id: &str,
        instance: u64,
        mailbox: &mut mpsc::Receiver<ChannelEvent>,
    ) -> bool {
        let mut channels = self.channels.write().await;

        if !mailbox.is_empty() {
            return false;
        }

        let owned = channels.get(id).is_some_and(|h| h.instance() == instance);
        if owned {
            if let Some(handle) = channels.remove(id) {
                handle.mark_done();
            }
            self.channels_removed.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                channel = %id,
                instance = instance,
                active = channels.len(),
                "Channel removed"
            );
        }

        mailbox.close();
        true
    }

    /// Stop every channel, then the transport.
    ///
    /// Queued mailbox events are not drained. Later dispatches are dropped.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let stopped = {
            let mut channels = self.channels.write().await;
            for handle in channels.values() {
                handle.stop();
            }
            let count = channels.len();
            channels.clear();
            count
        };

        self.transport.shutdown();

        tracing::info!(channels = stopped, "Relay shut down");
    }

    /// Consume a transport's event feed until it ends
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message { from, message } => self.dispatch(from, message).await,
                TransportEvent::Disconnected(addr) => self.on_peer_disconnected(&addr).await,
            }
        }

        tracing::debug!("Transport event feed closed");
    }

    /// Get total number of active channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Check if a channel is active
    pub async fn has_channel(&self, id: &str) -> bool {
        self.channels.read().await.contains_key(id)
    }

    /// Ask a channel for its statistics.
    ///
    /// The request goes through the mailbox, so the answer reflects every
    /// event dispatched to the channel before this call.
    pub async fn channel_stats(&self, id: &str) -> Option<ChannelStats> {
        let (tx, rx) = oneshot::channel();
        {
            let channels = self.channels.read().await;
            let handle = channels.get(id)?;
            handle.try_deliver(ChannelEvent::Stats(tx)).ok()?;
        }
        rx.await.ok()
    }

    /// Get relay-wide statistics
    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            active_channels: self.channel_count().await,
            channels_created: self.channels_created.load(Ordering::Relaxed),
            channels_removed: self.channels_removed.load(Ordering::Relaxed),
            joins_rejected: self.joins_rejected.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}
