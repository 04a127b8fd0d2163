//! Wire protocol for Mazout.
//!
//! Defines the frame format, the type code table, and payload conventions.
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────────┬────────────┬──────────┬────────────┬─────────────┬──────────────┬────────────┐
//! │ 0xAA (1)   │ 0xBB (1)   │ Type (1) │ Length (1) │ Payload (N) │ Checksum (1) │ 0xCC (1)   │
//! └────────────┴────────────┴──────────┴────────────┴─────────────┴──────────────┴────────────┘
//! ```
//!
//! The checksum is the XOR of every byte before it (markers, type, length and
//! payload). The terminator is written but not checked on decode.

mod codec;
mod kind;
mod packet;
mod value;

pub use codec::FrameCodec;
pub use kind::{DataKind, ValueEncoding};
pub use packet::{decode_packet, encode_frame, encode_value, Packet, Reading};
pub use value::{Decimal, DecimalParseError, Value};

/// First header marker.
pub const MARKER_0: u8 = 0xAA;

/// Second header marker.
pub const MARKER_1: u8 = 0xBB;

/// Trailing terminator byte.
pub const TERMINATOR: u8 = 0xCC;

/// Bytes before the payload: two markers, type code, length.
pub const HEADER_SIZE: usize = 4;

/// Bytes after the payload: checksum and terminator.
pub const TRAILER_SIZE: usize = 2;

/// Smallest buffer `decode` will look at.
pub const MIN_FRAME_SIZE: usize = 5;

/// Largest payload a one-byte length can describe.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Largest complete frame.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE + TRAILER_SIZE;

/// Running XOR over `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Total frame size for a payload of `payload_len` bytes.
pub fn frame_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + TRAILER_SIZE
}
