//! Tokio codec framing GameSpy packets on a byte stream.
//!
//! A frame ends at the first `\final\` terminator. Bytes after it stay in the
//! buffer for the next frame.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{Packet, SUFFIX};
use crate::error::{ProtocolError, Result};

/// Default upper bound for a single frame, matching the login read buffer
pub const DEFAULT_MAX_FRAME_LEN: usize = 512;

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_frame_len: usize,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(SUFFIX.len())
        .position(|window| window == SUFFIX.as_bytes())
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match find_terminator(src) {
            Some(position) => {
                let frame_len = position + SUFFIX.len();
                if frame_len > self.max_frame_len {
                    return Err(ProtocolError::OversizedPacket(frame_len));
                }
                let frame = src.split_to(frame_len);
                Packet::from_bytes(&frame).map(Some)
            }
            None if src.len() > self.max_frame_len => {
                Err(ProtocolError::OversizedPacket(src.len()))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => {
                src.advance(src.len());
                Err(ProtocolError::MalformedFraming)
            }
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        let bytes = item.to_bytes();
        if bytes.len() > self.max_frame_len {
            return Err(ProtocolError::OversizedPacket(bytes.len()));
        }
        dst.reserve(bytes.len());
        dst.put_slice(&bytes);
        Ok(())
    }
}
