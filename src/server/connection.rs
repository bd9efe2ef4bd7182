//! Per-socket connection handling
//!
//! Each accepted socket is split in two: the read side decodes frames into
//! transport events for the registry, the write side drains the peer's
//! outbound queue. When the read side ends the peer is dropped from the
//! table and a disconnect event is raised.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::config::ServerConfig;
use super::peers::PeerTable;
use crate::error::Result;
use crate::protocol::{self, FrameDecoder, RelayMessage};
use crate::transport::{Address, TransportEvent};

pub(super) struct Connection {
    addr: Address,
    socket: TcpStream,
    config: ServerConfig,
    peers: Arc<PeerTable>,
    events: mpsc::Sender<TransportEvent>,
}

impl Connection {
    pub(super) fn new(
        addr: Address,
        socket: TcpStream,
        config: ServerConfig,
        peers: Arc<PeerTable>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            addr,
            socket,
            config,
            peers,
            events,
        }
    }

    /// Serve the connection until the peer goes away or the transport closes
    pub(super) async fn run(self) -> Result<()> {
        let Connection {
            addr,
            socket,
            config,
            peers,
            events,
        } = self;

        let (outbound_tx, outbound_rx) = mpsc::channel(config.peer_queue_size.max(1));
        peers.register(addr.clone(), outbound_tx);
        let mut closed = peers.closed_signal();

        let (reader, writer) = socket.into_split();
        let writer_task = tokio::spawn(write_loop(writer, outbound_rx, addr.clone()));

        let result = tokio::select! {
            result = read_loop(reader, &addr, &config, &events) => result,
            _ = closed.wait_for(|closed| *closed) => Ok(()),
        };

        // Dropping the queue ends the writer
        peers.unregister(&addr);
        if let Err(e) = writer_task.await {
            tracing::debug!(peer = %addr, error = %e, "Writer task failed");
        }

        if !peers.is_closed() {
            // Registry may already be gone on shutdown
            let _ = events.send(TransportEvent::Disconnected(addr.clone())).await;
        }

        result
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    addr: &Address,
    config: &ServerConfig,
    events: &mpsc::Sender<TransportEvent>,
) -> Result<()> {
    let decoder = FrameDecoder::with_max_frame_size(config.max_frame_size);
    let mut buf = BytesMut::with_capacity(config.read_buffer_size);

    loop {
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(message)) => {
                    let event = TransportEvent::Message {
                        from: addr.clone(),
                        message,
                    };
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    tracing::warn!(peer = %addr, error = %e, "Closing connection");
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "Dropping undecodable frame");
                }
            }
        }

        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<RelayMessage>,
    addr: Address,
) {
    let mut buf = BytesMut::new();

    while let Some(message) = outbound.recv().await {
        buf.clear();
        encode_into(&message, &mut buf, &addr);

        // Coalesce whatever else is already queued
        while let Ok(message) = outbound.try_recv() {
            encode_into(&message, &mut buf, &addr);
        }

        if buf.is_empty() {
            continue;
        }
        if let Err(e) = writer.write_all(&buf).await {
            tracing::debug!(peer = %addr, error = %e, "Write failed");
            return;
        }
    }

    let _ = writer.shutdown().await;
}

fn encode_into(message: &RelayMessage, buf: &mut BytesMut, addr: &Address) {
    if let Err(e) = protocol::encode(message, buf) {
        tracing::warn!(
            peer = %addr,
            kind = message.body.kind(),
            error = %e,
            "Failed to encode message"
        );
    }
}
