//! Frame layout and header encoding/decoding
//!
//! The frame format uses a 48-byte header:
//! - session: 32 bytes, verbatim
//! - action: 8 bytes (u64, little-endian)
//! - payload length: 8 bytes (u64, little-endian)
//!
//! followed by the payload bytes. Total on-wire size is
//! `48 + payload length`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::session::{SessionId, SESSION_ID_LEN};

/// Numeric code selecting which handlers process a frame.
pub type Action = u64;

/// Reserved action carried by the handshake initiation frame.
pub const ACTION_INIT: Action = 1;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 48;

/// Maximum total on-wire frame size including the header.
///
/// The header field itself places no bound on the declared payload
/// length; this constant is the policy cap enforced by [`FrameCodec`]
/// at the connection boundary.
///
/// [`FrameCodec`]: crate::codec::FrameCodec
pub const MAX_FRAME_SIZE: usize = 4096;

/// Frame header containing routing and length information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Session this frame belongs to
    pub session: SessionId,
    /// Action requested by the frame
    pub action: Action,
    /// Length of the payload in bytes
    pub payload_length: u64,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(session: SessionId, action: Action, payload_length: u64) -> Self {
        Self {
            session,
            action,
            payload_length,
        }
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_slice(self.session.as_bytes());
        dst.put_u64_le(self.action);
        dst.put_u64_le(self.payload_length);
    }

    /// Decode a header from a byte buffer.
    ///
    /// Returns None if there aren't enough bytes in the buffer yet.
    /// Any action and any session bit pattern are valid, so a complete
    /// header always decodes.
    pub fn decode(src: &mut BytesMut) -> Option<Self> {
        if src.len() < HEADER_SIZE {
            return None;
        }

        let mut session = [0u8; SESSION_ID_LEN];
        src.copy_to_slice(&mut session);
        let action = src.get_u64_le();
        let payload_length = src.get_u64_le();

        Some(Self {
            session: SessionId::new(session),
            action,
            payload_length,
        })
    }
}

/// The unit of wire-level exchange: a session, an action and an opaque
/// payload.
///
/// The payload length field of the wire format is derived from the
/// payload itself, so the `payload_length == len(payload)` invariant
/// holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Session this frame belongs to
    pub session: SessionId,
    /// Action requested by the frame
    pub action: Action,
    /// Opaque payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(session: SessionId, action: Action, payload: impl Into<Bytes>) -> Self {
        Self {
            session,
            action,
            payload: payload.into(),
        }
    }

    /// Length of the payload in bytes
    pub fn payload_length(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Total on-wire size of this frame
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Header for this frame
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.session, self.action, self.payload_length())
    }

    /// Serialize the frame into a fresh buffer.
    ///
    /// Output length is exactly [`Frame::wire_size`]. Never fails.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Serialize the frame onto the end of an existing buffer
    pub fn encode_into(&self, dst: &mut BytesMut) {
        self.header().encode(dst);
        dst.extend_from_slice(&self.payload);
    }

    /// Parse a frame from a complete buffer.
    ///
    /// Bytes beyond the declared payload length are ignored; callers own
    /// frame boundary discipline. No upper bound is enforced on the
    /// declared length here — see [`MAX_FRAME_SIZE`] and the codec for
    /// where the policy applies.
    pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let mut session = [0u8; SESSION_ID_LEN];
        session.copy_from_slice(&data[..SESSION_ID_LEN]);

        let mut rest = &data[SESSION_ID_LEN..];
        let action = rest.get_u64_le();
        let payload_length = rest.get_u64_le();

        let available = data.len() - HEADER_SIZE;
        if (available as u64) < payload_length {
            return Err(ProtocolError::TruncatedPayload {
                declared: payload_length,
                available,
            });
        }

        let end = HEADER_SIZE + payload_length as usize;
        let payload = Bytes::copy_from_slice(&data[HEADER_SIZE..end]);

        Ok(Frame {
            session: SessionId::new(session),
            action,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> SessionId {
        let mut bytes = [0u8; SESSION_ID_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7) ^ 0x5a;
        }
        SessionId::new(bytes)
    }

    #[test]
    fn test_header_roundtrip() {
        let header = FrameHeader::new(test_session(), 42, 12345);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = FrameHeader::decode(&mut buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_insufficient_bytes() {
        let mut buf = BytesMut::from(&[0u8; HEADER_SIZE - 1][..]);
        assert!(FrameHeader::decode(&mut buf).is_none());
    }

    #[test]
    fn test_wire_layout() {
        // The worked example: action 101, 12-byte payload, 60 bytes total
        let session = test_session();
        let frame = Frame::new(session, 101, Bytes::from("Hello World!"));

        let encoded = frame.encode();
        assert_eq!(encoded.len(), 60);
        assert_eq!(&encoded[..32], &session.as_bytes()[..]);
        assert_eq!(&encoded[32..40], &101u64.to_le_bytes());
        assert_eq!(&encoded[40..48], &12u64.to_le_bytes());
        assert_eq!(&encoded[48..], b"Hello World!".as_slice());

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_encode_length_invariant() {
        for len in [0usize, 1, 47, 48, 1000] {
            let frame = Frame::new(test_session(), 9, vec![0xabu8; len]);
            assert_eq!(frame.encode().len(), HEADER_SIZE + len);
        }
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let frame = Frame::new(test_session(), 3, Bytes::new());
        let encoded = frame.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.payload_length(), 0);
    }

    #[test]
    fn test_decode_short_header() {
        let err = Frame::decode(&[0u8; 47]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedHeader {
                expected: HEADER_SIZE,
                actual: 47
            }
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let frame = Frame::new(test_session(), 7, vec![1u8; 16]);
        let encoded = frame.encode();

        let err = Frame::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TruncatedPayload {
                declared: 16,
                available: 15
            }
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let frame = Frame::new(test_session(), 11, Bytes::from("payload"));
        let mut data = frame.encode().to_vec();
        data.extend_from_slice(b"trailing garbage");

        let decoded = Frame::decode(&data).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_any_action_and_session_decode() {
        let frame = Frame::new(SessionId::new([0xff; SESSION_ID_LEN]), u64::MAX, Bytes::new());
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }
}
