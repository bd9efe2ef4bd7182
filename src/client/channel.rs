//! Peer-side relay channel
//!
//! One [`RelayChannel`] is one peer's membership in one channel, carried over
//! its own TCP connection to the relay.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::protocol::{self, FrameDecoder, MessageBody, RelayMessage};
use crate::transport::Address;

/// A joined relay channel
///
/// # Example
/// ```no_run
/// use relay_rs::client::RelayChannel;
///
/// # async fn example() -> relay_rs::error::Result<()> {
/// let mut channel = RelayChannel::join("127.0.0.1:7700", "dkg-session").await?;
/// channel.send(&b"round 1 deal"[..]).await?;
///
/// let (from, blob) = channel.recv().await?;
/// println!("{} sent {} bytes", from, blob.len());
///
/// channel.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct RelayChannel {
    id: String,
    local_addr: Address,
    stream: TcpStream,
    decoder: FrameDecoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl RelayChannel {
    /// Connect to the relay at `addr` and join channel `id`.
    ///
    /// Returns once the relay has accepted the join. A refused join yields
    /// [`Error::JoinRejected`] with the relay's reason.
    pub async fn join<A: ToSocketAddrs>(addr: A, id: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let local_addr = Address::from(stream.local_addr()?);

        let mut channel = Self {
            id: id.into(),
            local_addr,
            stream,
            decoder: FrameDecoder::new(),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::new(),
        };

        let join = RelayMessage::join(channel.id.clone());
        channel.write(&join).await?;

        loop {
            let message = channel.read_message().await?;
            if message.channel != channel.id {
                continue;
            }
            let Some(response) = message.as_join_response() else {
                tracing::debug!(
                    channel = %channel.id,
                    kind = message.body.kind(),
                    "Ignoring message before join"
                );
                continue;
            };
            if !response.is_ok() {
                let reason = response.reason.clone().unwrap_or_default();
                return Err(Error::JoinRejected(reason));
            }
            break;
        }

        tracing::debug!(channel = %channel.id, addr = %channel.local_addr, "Joined relay channel");
        Ok(channel)
    }

    /// Channel id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Address the relay knows this peer by
    pub fn local_addr(&self) -> &Address {
        &self.local_addr
    }

    /// Broadcast a blob to the other participants
    pub async fn send(&mut self, blob: impl Into<Bytes>) -> Result<()> {
        let ingress = RelayMessage::ingress(self.id.clone(), blob);
        self.write(&ingress).await
    }

    /// Wait for the next blob from another participant.
    ///
    /// Returns the sender's address with the blob. Anything else the relay
    /// sends is skipped.
    pub async fn recv(&mut self) -> Result<(Address, Bytes)> {
        loop {
            let message = self.read_message().await?;
            match message.body {
                MessageBody::Egress { from, blob } if message.channel == self.id => {
                    return Ok((from, blob));
                }
                other => {
                    tracing::debug!(
                        channel = %self.id,
                        kind = other.kind(),
                        "Skipping relay message"
                    );
                }
            }
        }
    }

    /// Leave the channel and close the connection
    pub async fn close(mut self) -> Result<()> {
        let leave = RelayMessage::leave(self.id.clone());
        self.write(&leave).await?;
        self.stream.shutdown().await?;

        tracing::debug!(channel = %self.id, "Left relay channel");
        Ok(())
    }

    async fn write(&mut self, message: &RelayMessage) -> Result<()> {
        self.write_buf.clear();
        protocol::encode(message, &mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<RelayMessage> {
        loop {
            match self.decoder.decode(&mut self.read_buf) {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(channel = %self.id, error = %e, "Dropping undecodable frame");
                    continue;
                }
            }

            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}
