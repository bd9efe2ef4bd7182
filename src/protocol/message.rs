//! Relay message vocabulary
//!
//! ```text
//! Peer                                   Relay
//!   |------ JOIN(channel) ---------------->|
//!   |<----- JOIN_RESPONSE(OK | FAILURE) ---|
//!   |------ INGRESS(channel, blob) ------->|---- EGRESS(from, blob) ----> other participants
//!   |------ LEAVE(channel) --------------->|
//! ```
//!
//! Blobs are opaque. The relay relabels an INGRESS as EGRESS and forwards the
//! same bytes without looking at them.

use bytes::Bytes;

use crate::transport::Address;

/// Outcome of a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    Ok,
    Failure,
}

/// Reply to a JOIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResponse {
    pub status: JoinStatus,
    /// Human-readable reason, only set on failure
    pub reason: Option<String>,
}

impl JoinResponse {
    pub fn ok() -> Self {
        Self {
            status: JoinStatus::Ok,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: JoinStatus::Failure,
            reason: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == JoinStatus::Ok
    }
}

/// Payload of a relay message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Peer asks to join the channel
    Join,
    /// Peer leaves the channel (also synthesized on disconnect)
    Leave,
    /// Blob a participant wants broadcast to the others
    Ingress(Bytes),
    /// Blob forwarded to a participant, tagged with its originator
    Egress { from: Address, blob: Bytes },
    /// Relay's answer to a join
    JoinResponse(JoinResponse),
}

impl MessageBody {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Join => "JOIN",
            MessageBody::Leave => "LEAVE",
            MessageBody::Ingress(_) => "INGRESS",
            MessageBody::Egress { .. } => "EGRESS",
            MessageBody::JoinResponse(_) => "JOIN_RESPONSE",
        }
    }
}

/// A message exchanged between a peer and the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    /// Channel the message belongs to
    pub channel: String,
    pub body: MessageBody,
}

impl RelayMessage {
    pub fn new(channel: impl Into<String>, body: MessageBody) -> Self {
        Self {
            channel: channel.into(),
            body,
        }
    }

    pub fn join(channel: impl Into<String>) -> Self {
        Self::new(channel, MessageBody::Join)
    }

    pub fn leave(channel: impl Into<String>) -> Self {
        Self::new(channel, MessageBody::Leave)
    }

    pub fn ingress(channel: impl Into<String>, blob: impl Into<Bytes>) -> Self {
        Self::new(channel, MessageBody::Ingress(blob.into()))
    }

    pub fn egress(channel: impl Into<String>, from: Address, blob: Bytes) -> Self {
        Self::new(channel, MessageBody::Egress { from, blob })
    }

    pub fn join_response(channel: impl Into<String>, response: JoinResponse) -> Self {
        Self::new(channel, MessageBody::JoinResponse(response))
    }

    /// Get the join response, if this is one
    pub fn as_join_response(&self) -> Option<&JoinResponse> {
        match &self.body {
            MessageBody::JoinResponse(response) => Some(response),
            _ => None,
        }
    }

    /// Get the originator and blob, if this is an egress
    pub fn as_egress(&self) -> Option<(&Address, &Bytes)> {
        match &self.body {
            MessageBody::Egress { from, blob } => Some((from, blob)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_response_constructors() {
        let ok = JoinResponse::ok();
        assert!(ok.is_ok());
        assert!(ok.reason.is_none());

        let failed = JoinResponse::failure("too many channels");
        assert!(!failed.is_ok());
        assert_eq!(failed.reason.as_deref(), Some("too many channels"));
    }

    #[test]
    fn test_accessors() {
        let msg = RelayMessage::join_response("room", JoinResponse::ok());
        assert!(msg.as_join_response().unwrap().is_ok());
        assert!(msg.as_egress().is_none());

        let msg = RelayMessage::egress("room", Address::from("alice"), Bytes::from_static(b"hi"));
        let (from, blob) = msg.as_egress().unwrap();
        assert_eq!(from.as_str(), "alice");
        assert_eq!(&blob[..], b"hi");
        assert_eq!(msg.body.kind(), "EGRESS");
    }
}
