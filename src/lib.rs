//! # Mazout
//!
//! Telemetry and control link between an operator and a remote vehicle
//! controller over one persistent TCP connection.
//!
//! Readings and commands (RPM, bus voltage, GPS position, ...) travel as
//! small checksummed binary frames. Recorded sensor data can be replayed to
//! the same server as a stream of JSON documents.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Operator console / CLI commands                │
//! ├──────────────────────────────┬──────────────────────────────────┤
//! │  SendSession   ReplaySession │           ReceiveLoop            │
//! │        (foreground)          │          (background)            │
//! ├──────────────────────────────┴──────────────────────────────────┤
//! │        Session: one connection, joined tasks, stop tokens       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │          Protocol: frame encode/decode, FrameCodec              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                    Transport (TCP connection)                   │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::cast_possible_truncation)]  // Payload lengths are bounded by MAX_PAYLOAD_SIZE
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]       // Sample indices fit an f64
#![allow(clippy::cast_possible_wrap)]        // Signed payload bytes
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::future_not_send)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use
#![allow(clippy::ignored_unit_patterns)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod transport;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default device server port
pub const DEFAULT_PORT: u16 = 3050;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{encode_frame, DataKind, Decimal, FrameCodec, Packet, Reading, Value};
    pub use crate::replay::{ReplaySession, TelemetryRecord};
    pub use crate::session::{
        CancellationToken, OperatorInput, ReceiveEvent, ReceiveLoop, SendSession, Session,
        StopReason,
    };
    pub use crate::transport::{TcpConnection, Transport, TransportConfig};
}
