//! Frame encoding and decoding.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::{
    checksum, frame_len, DataKind, Value, HEADER_SIZE, MARKER_0, MARKER_1, MAX_PAYLOAD_SIZE,
    MIN_FRAME_SIZE, TERMINATOR,
};
use crate::error::ProtocolError;

/// Encode a frame for `type_code` carrying `payload`.
pub fn encode_frame(type_code: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(frame_len(payload.len()));
    buf.extend_from_slice(&[MARKER_0, MARKER_1, type_code, payload.len() as u8]);
    buf.extend_from_slice(payload);
    buf.push(checksum(&buf));
    buf.push(TERMINATOR);
    Ok(buf)
}

/// Encode a typed value for `kind`.
pub fn encode_value(kind: DataKind, value: &Value) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(kind.code(), &value.to_payload())
}

/// Decode a frame from the start of `buf`.
pub fn decode_packet(buf: &[u8]) -> Result<Packet, ProtocolError> {
    Packet::decode(buf)
}

/// Uniform interpretation of a payload: text for GPS, otherwise a signed
/// big-endian integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    Text(String),
    Integer(i64),
    /// Payloads with no integer reading: empty, wider than 8 bytes, or GPS
    /// bytes that are not UTF-8.
    Raw(Vec<u8>),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Raw(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

/// A decoded frame.
///
/// Immutable once built; produced by [`Packet::decode`] or [`Packet::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    type_code: u8,
    kind: DataKind,
    payload: Vec<u8>,
    checksum: u8,
}

impl Packet {
    /// Build a packet, computing its checksum.
    pub fn new(type_code: u8, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let header = [MARKER_0, MARKER_1, type_code, payload.len() as u8];
        let sum = checksum(&header) ^ checksum(&payload);

        Ok(Self {
            type_code,
            kind: DataKind::from_code(type_code),
            payload,
            checksum: sum,
        })
    }

    /// Decode a frame.
    ///
    /// Checks run in order: minimum size, header markers, declared length
    /// against the buffer, checksum. Bytes after the frame are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < MIN_FRAME_SIZE {
            return Err(ProtocolError::Truncated);
        }

        if buf[0] != MARKER_0 || buf[1] != MARKER_1 {
            return Err(ProtocolError::InvalidHeader);
        }

        let type_code = buf[2];
        let length = buf[3] as usize;
        if frame_len(length) > buf.len() {
            return Err(ProtocolError::Truncated);
        }

        let body_end = HEADER_SIZE + length;
        let computed = checksum(&buf[..body_end]);
        let stored = buf[body_end];
        if computed != stored {
            return Err(ProtocolError::ChecksumMismatch {
                expected: computed,
                got: stored,
            });
        }

        Ok(Self {
            type_code,
            kind: DataKind::from_code(type_code),
            payload: buf[HEADER_SIZE..body_end].to_vec(),
            checksum: stored,
        })
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.frame_len());
        buf.extend_from_slice(&[MARKER_0, MARKER_1, self.type_code, self.payload.len() as u8]);
        buf.extend_from_slice(&self.payload);
        buf.push(self.checksum);
        buf.push(TERMINATOR);
        buf
    }

    pub fn type_code(&self) -> u8 {
        self.type_code
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Total size on the wire.
    pub fn frame_len(&self) -> usize {
        frame_len(self.payload.len())
    }

    /// Uniform reading: UTF-8 text for GPS, signed big-endian integer otherwise.
    pub fn reading(&self) -> Reading {
        if self.kind == DataKind::Gps {
            return match std::str::from_utf8(&self.payload) {
                Ok(text) => Reading::Text(text.to_string()),
                Err(_) => Reading::Raw(self.payload.clone()),
            };
        }

        match self.payload.len() {
            1..=8 => Reading::Integer(BigEndian::read_int(&self.payload, self.payload.len())),
            _ => Reading::Raw(self.payload.clone()),
        }
    }

    /// Typed value under the kind's payload convention.
    pub fn value(&self) -> Value {
        Value::from_payload(self.kind, &self.payload)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{type_code: {}, kind: {}, payload: {}}}",
            self.type_code,
            self.kind,
            self.reading()
        )
    }
}
