//! Binary frame codec
//!
//! Every frame is length-prefixed so a reader can always skip a frame it
//! does not understand:
//!
//! ```text
//! +-----------+--------+--------------+-----------+------------------+
//! | len: u32  | tag:u8 | chan_len:u16 | channel   | body (per tag)   |
//! +-----------+--------+--------------+-----------+------------------+
//!
//! 0x01 JOIN           (empty)
//! 0x02 LEAVE          (empty)
//! 0x03 INGRESS        blob
//! 0x04 EGRESS         from_len:u16 | from | blob
//! 0x05 JOIN_RESPONSE  status:u8 | reason_len:u16 | reason
//! ```
//!
//! All integers are big-endian. `len` excludes the length field itself.
//! Blobs run to the end of the frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::message::{JoinResponse, JoinStatus, MessageBody, RelayMessage};
use crate::error::ProtocolError;
use crate::transport::Address;

/// Append one frame for `message` to `buf`.
///
/// On error `buf` is left as it was.
pub fn encode(message: &RelayMessage, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let start = buf.len();
    let result = encode_frame(message, buf, start);
    if result.is_err() {
        buf.truncate(start);
    }
    result
}

/// Encode a single message into its own buffer
pub fn encode_to_bytes(message: &RelayMessage) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    encode(message, &mut buf)?;
    Ok(buf.freeze())
}

fn encode_frame(
    message: &RelayMessage,
    buf: &mut BytesMut,
    start: usize,
) -> Result<(), ProtocolError> {
    // Length is patched in once the frame is written
    buf.put_u32(0);
    buf.put_u8(tag_of(&message.body));
    put_string(buf, &message.channel, "channel id too long")?;

    match &message.body {
        MessageBody::Join | MessageBody::Leave => {}
        MessageBody::Ingress(blob) => buf.put_slice(blob),
        MessageBody::Egress { from, blob } => {
            put_string(buf, from.as_str(), "egress origin too long")?;
            buf.put_slice(blob);
        }
        MessageBody::JoinResponse(response) => {
            buf.put_u8(match response.status {
                JoinStatus::Ok => STATUS_OK,
                JoinStatus::Failure => STATUS_FAILURE,
            });
            put_string(
                buf,
                response.reason.as_deref().unwrap_or(""),
                "join reason too long",
            )?;
        }
    }

    let len = buf.len() - start - FRAME_LENGTH_SIZE;
    let len = u32::try_from(len).map_err(|_| ProtocolError::FrameTooLarge {
        size: len,
        max: u32::MAX as usize,
    })?;
    buf[start..start + FRAME_LENGTH_SIZE].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

fn tag_of(body: &MessageBody) -> u8 {
    match body {
        MessageBody::Join => TAG_JOIN,
        MessageBody::Leave => TAG_LEAVE,
        MessageBody::Ingress(_) => TAG_INGRESS,
        MessageBody::Egress { .. } => TAG_EGRESS,
        MessageBody::JoinResponse(_) => TAG_JOIN_RESPONSE,
    }
}

fn put_string(
    buf: &mut BytesMut,
    value: &str,
    too_long: &'static str,
) -> Result<(), ProtocolError> {
    let len = u16::try_from(value.len()).map_err(|_| ProtocolError::Malformed(too_long))?;
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Streaming frame decoder
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Create a decoder accepting frames up to [`MAX_FRAME_SIZE`]
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Decode the next frame from `buf`.
    ///
    /// Returns `Ok(None)` without consuming anything while the frame is
    /// incomplete. Once a frame is complete it is consumed, whether or not it
    /// decodes; see [`ProtocolError::is_fatal`].
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<RelayMessage>, ProtocolError> {
        if buf.len() < FRAME_LENGTH_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let total = FRAME_LENGTH_SIZE + len;
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }

        buf.advance(FRAME_LENGTH_SIZE);
        let frame = buf.split_to(len).freeze();
        decode_frame(frame).map(Some)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_frame(mut frame: Bytes) -> Result<RelayMessage, ProtocolError> {
    if !frame.has_remaining() {
        return Err(ProtocolError::Malformed("missing message type"));
    }
    let tag = frame.get_u8();
    if !(TAG_JOIN..=TAG_JOIN_RESPONSE).contains(&tag) {
        return Err(ProtocolError::UnknownMessageType(tag));
    }

    let channel = read_string(&mut frame, "channel id")?;

    let body = match tag {
        TAG_JOIN => MessageBody::Join,
        TAG_LEAVE => MessageBody::Leave,
        TAG_INGRESS => MessageBody::Ingress(frame),
        TAG_EGRESS => {
            let from = read_string(&mut frame, "egress origin")?;
            MessageBody::Egress {
                from: Address::from(from),
                blob: frame,
            }
        }
        _ => {
            if !frame.has_remaining() {
                return Err(ProtocolError::Malformed("join status"));
            }
            let status = match frame.get_u8() {
                STATUS_OK => JoinStatus::Ok,
                STATUS_FAILURE => JoinStatus::Failure,
                _ => return Err(ProtocolError::Malformed("join status")),
            };
            let reason = read_string(&mut frame, "join reason")?;
            MessageBody::JoinResponse(JoinResponse {
                status,
                reason: if reason.is_empty() { None } else { Some(reason) },
            })
        }
    };

    Ok(RelayMessage { channel, body })
}

fn read_string(buf: &mut Bytes, field: &'static str) -> Result<String, ProtocolError> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::Malformed(field));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Malformed(field));
    }
    let bytes = buf.split_to(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(message: RelayMessage) -> RelayMessage {
        let mut buf = BytesMut::new();
        encode(&message, &mut buf).unwrap();
        let decoded = FrameDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        decoded
    }

    #[test]
    fn test_round_trip_each_kind() {
        let messages = vec![
            RelayMessage::join("room1"),
            RelayMessage::leave("room1"),
            RelayMessage::ingress("room1", Bytes::from_static(b"share #3")),
            RelayMessage::egress(
                "room1",
                Address::from("10.0.0.1:7700"),
                Bytes::from_static(b"\x00\x01"),
            ),
            RelayMessage::join_response("room1", JoinResponse::ok()),
            RelayMessage::join_response("room1", JoinResponse::failure("too many channels")),
        ];

        for message in messages {
            assert_eq!(round_trip(message.clone()), message);
        }
    }

    #[test]
    fn test_join_frame_layout() {
        let bytes = encode_to_bytes(&RelayMessage::join("ab")).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 5, TAG_JOIN, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_incomplete_frame_is_not_consumed() {
        let message = RelayMessage::ingress("room", Bytes::from_static(b"payload"));
        let bytes = encode_to_bytes(&message).unwrap();
        let decoder = FrameDecoder::new();

        let mut buf = BytesMut::from(&bytes[..2]);
        assert_eq!(decoder.decode(&mut buf), Ok(None));
        assert_eq!(buf.len(), 2);

        let mut buf = BytesMut::from(&bytes[..bytes.len() - 1]);
        assert_eq!(decoder.decode(&mut buf), Ok(None));
        assert_eq!(buf.len(), bytes.len() - 1);

        buf.extend_from_slice(&bytes[bytes.len() - 1..]);
        assert!(decoder.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buf = BytesMut::new();
        encode(&RelayMessage::join("a"), &mut buf).unwrap();
        encode(&RelayMessage::leave("b"), &mut buf).unwrap();

        let decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(RelayMessage::join("a")));
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(RelayMessage::leave("b")));
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversize_frame_is_fatal() {
        let mut buf = BytesMut::new();
        buf.put_u32(1000);
        buf.put_u8(TAG_JOIN);

        let err = FrameDecoder::with_max_frame_size(64).decode(&mut buf).unwrap_err();
        assert_eq!(err, ProtocolError::FrameTooLarge { size: 1000, max: 64 });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_tag_is_skipped() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_u8(0x7f);
        buf.put_u16(0);
        encode(&RelayMessage::join("next"), &mut buf).unwrap();

        let decoder = FrameDecoder::new();
        let err = decoder.decode(&mut buf).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownMessageType(0x7f));
        assert!(!err.is_fatal());
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(RelayMessage::join("next")));
    }

    #[test]
    fn test_malformed_frames() {
        let decoder = FrameDecoder::new();

        // Channel length runs past the end of the frame
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_u8(TAG_JOIN);
        buf.put_u16(10);
        assert_eq!(
            decoder.decode(&mut buf),
            Err(ProtocolError::Malformed("channel id"))
        );
        assert!(buf.is_empty());

        // Invalid UTF-8 channel id
        let mut buf = BytesMut::new();
        buf.put_u32(5);
        buf.put_u8(TAG_LEAVE);
        buf.put_u16(2);
        buf.put_slice(&[0xff, 0xfe]);
        assert_eq!(decoder.decode(&mut buf), Err(ProtocolError::InvalidUtf8));

        // Unknown join status
        let mut buf = BytesMut::new();
        buf.put_u32(6);
        buf.put_u8(TAG_JOIN_RESPONSE);
        buf.put_u16(0);
        buf.put_u8(9);
        buf.put_u16(0);
        assert_eq!(
            decoder.decode(&mut buf),
            Err(ProtocolError::Malformed("join status"))
        );
    }

    #[test]
    fn test_overlong_channel_id_leaves_buffer_untouched() {
        let mut buf = BytesMut::from(&b"keep"[..]);
        let message = RelayMessage::join("x".repeat(u16::MAX as usize + 1));

        assert!(encode(&message, &mut buf).is_err());
        assert_eq!(&buf[..], b"keep");
    }
}
