//! Error types for Mazout.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::DataKind;

/// Result type alias for Mazout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Mazout.
#[derive(Error, Debug)]
pub enum Error {
    // Wire protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Link errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Operator errors
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    // File replay errors
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Frame encoding and decoding errors.
///
/// Decode failures are contained in the receive loop: the offending frame is
/// dropped and reported, never surfaced as a session-ending error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid header")]
    InvalidHeader,

    #[error("truncated frame")]
    Truncated,

    #[error("checksum mismatch: expected {expected:#04x}, got {got:#04x}")]
    ChecksumMismatch { expected: u8, got: u8 },

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Connection level errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect to {addr} failed: {reason}")]
    ConnectFailed { addr: String, reason: String },

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("could not resolve {0}")]
    Resolve(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("peer disconnected")]
    Disconnected,

    #[error("connection closed")]
    ConnectionClosed,
}

/// Operator input errors. Always recoverable: the operator is prompted again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("'{0}' is not a type code")]
    InvalidTypeCode(String),

    #[error("unknown type code {0}")]
    UnknownTypeCode(u8),

    #[error("{0} cannot be sent from the console")]
    NotSendable(DataKind),

    #[error("invalid value for {kind}: {reason}")]
    InvalidValue { kind: DataKind, reason: String },

    #[error("{kind} value {value} out of range")]
    OutOfRange { kind: DataKind, value: String },
}

/// Bulk telemetry replay errors.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file is empty")]
    Empty,

    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: column '{column}' is not a number: '{value}'")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: expected {expected} fields, found {found}")]
    FieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl Error {
    /// Check if the error only affects the current step (reprompt or drop a frame).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Input(_)
                | Error::Protocol(
                    ProtocolError::InvalidHeader
                        | ProtocolError::Truncated
                        | ProtocolError::ChecksumMismatch { .. }
                )
        )
    }

    /// Check if the error ends the session and requires a new connect.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Error::Transport(
                TransportError::ConnectFailed { .. }
                    | TransportError::ConnectTimeout(_)
                    | TransportError::Resolve(_)
                    | TransportError::SendFailed(_)
                    | TransportError::ReceiveFailed(_)
                    | TransportError::Disconnected
                    | TransportError::ConnectionClosed
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_recoverable() {
        let err: Error = ProtocolError::Truncated.into();
        assert!(err.is_recoverable());
        assert!(!err.ends_session());

        let err: Error = ProtocolError::ChecksumMismatch {
            expected: 0x10,
            got: 0x11,
        }
        .into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_transport_errors_end_session() {
        let err: Error = TransportError::Disconnected.into();
        assert!(err.ends_session());
        assert!(!err.is_recoverable());

        let err: Error = TransportError::SendFailed("broken pipe".into()).into();
        assert!(err.ends_session());
    }

    #[test]
    fn test_input_error_display() {
        let err = InputError::NotSendable(DataKind::Immobilize);
        assert_eq!(err.to_string(), "immobilize cannot be sent from the console");
    }
}
