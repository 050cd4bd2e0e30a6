//! Tokio codec for framed protocol messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{Frame, FrameHeader, HEADER_SIZE, MAX_FRAME_SIZE};

/// Codec for encoding/decoding frames on a byte stream.
///
/// Decoding is incremental: bytes accumulate until a full header and then
/// a full payload are available, so frames split or coalesced across
/// transport reads are handled correctly. Both directions enforce the
/// [`MAX_FRAME_SIZE`] policy.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Header decoded while waiting for its payload to arrive
    pending_header: Option<FrameHeader>,
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Try to decode a header if we don't have one
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src) {
                Some(h) => h,
                None => return Ok(None), // Need more data
            },
        };

        let total = (HEADER_SIZE as u64).saturating_add(header.payload_length);
        if total > MAX_FRAME_SIZE as u64 {
            return Err(ProtocolError::FrameTooLarge {
                size: total,
                max: MAX_FRAME_SIZE,
            });
        }

        // Check if we have enough data for the payload
        let payload_len = header.payload_length as usize;
        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            // Save header and wait for more data
            self.pending_header = Some(header);
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();

        Ok(Some(Frame {
            session: header.session,
            action: header.action,
            payload,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = frame.wire_size();
        if size > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: size as u64,
                max: MAX_FRAME_SIZE,
            });
        }

        frame.encode_into(dst);
        Ok(())
    }
}
