//! Stream framing on top of [`Packet::decode`].
//!
//! A single socket read can hold part of a frame, several frames, or bytes
//! that are not frames at all. `FrameCodec` buffers partial frames, splits
//! coalesced ones and resynchronises on the next header marker after garbage.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{frame_len, Packet, HEADER_SIZE, MARKER_0, MARKER_1, TERMINATOR};
use crate::error::ProtocolError;

/// Tokio codec for Mazout frames.
///
/// Every `Err` returned by [`Decoder::decode`] has already consumed the bytes
/// it complains about, so callers may keep decoding after an error.
#[derive(Debug, Default)]
pub struct FrameCodec {
    dropped: u64,
}

impl FrameCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bad frames or garbage runs discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Skip to the next candidate marker. Returns true if bytes were dropped.
    fn skip_to_marker(src: &mut BytesMut) -> bool {
        let start = src
            .windows(2)
            .position(|w| w[0] == MARKER_0 && w[1] == MARKER_1)
            .or_else(|| {
                // A lone first marker at the end may be completed by the next read.
                (src.last() == Some(&MARKER_0)).then(|| src.len() - 1)
            });

        match start {
            Some(0) => false,
            Some(n) => {
                src.advance(n);
                true
            }
            None => {
                src.clear();
                true
            }
        }
    }

    /// Offset of the first complete, valid, terminated frame after the
    /// leading marker.
    fn embedded_frame(src: &BytesMut) -> Option<usize> {
        (1..src.len().saturating_sub(1))
            .filter(|&i| src[i] == MARKER_0 && src[i + 1] == MARKER_1)
            .find(|&i| match Packet::decode(&src[i..]) {
                Ok(packet) => src.get(i + packet.frame_len() - 1) == Some(&TERMINATOR),
                Err(_) => false,
            })
    }
}

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = crate::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if Self::skip_to_marker(src) {
            self.dropped += 1;
            return Err(ProtocolError::InvalidHeader.into());
        }

        // Need the length byte before the frame size is known
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let total_len = frame_len(src[3] as usize);
        if src.len() < total_len {
            // A whole frame inside the pending one means its length byte lied
            if let Some(next) = Self::embedded_frame(src) {
                src.advance(next);
                self.dropped += 1;
                return Err(ProtocolError::Truncated.into());
            }
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        match Packet::decode(&src[..total_len]) {
            Ok(packet) => {
                src.advance(total_len);
                Ok(Some(packet))
            }
            Err(e) => {
                // Drop the first marker so the next call resynchronises
                src.advance(1);
                self.dropped += 1;
                Err(e.into())
            }
        }
    }
}

impl Encoder<Packet> for FrameCodec {
    type Error = crate::Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.frame_len());
        dst.put_slice(&item.encode());
        Ok(())
    }
}
