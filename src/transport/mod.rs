//! Transport layer for Mazout.
//!
//! One persistent TCP stream per session. Reads and writes run on independent
//! halves of the socket; `close` is safe to call while either is in flight.

mod tcp;

pub use tcp::TcpConnection;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Bytes requested per read. One read is expected to hold at most one frame,
/// though the receive loop copes with partial and coalesced frames.
pub const DEFAULT_RECV_CHUNK: usize = 1024;

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection timeout.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Upper bound on each readability wait. Also bounds how long a receive
    /// loop can go without checking for cancellation.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum bytes per read.
    #[serde(default = "default_recv_chunk")]
    pub recv_chunk_size: usize,

    /// Enable TCP_NODELAY.
    #[serde(default = "default_nodelay")]
    pub tcp_nodelay: bool,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_recv_chunk() -> usize {
    DEFAULT_RECV_CHUNK
}
fn default_nodelay() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            poll_interval: default_poll_interval(),
            recv_chunk_size: default_recv_chunk(),
            tcp_nodelay: default_nodelay(),
        }
    }
}

/// A connected, bidirectional byte link.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Remote address.
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Write the whole frame or fail.
    async fn send(&self, frame: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for data (or EOF) to become readable.
    async fn poll_readable(&self, timeout: Duration) -> Result<bool>;

    /// Read up to `max_bytes`. A zero-length read is reported as
    /// [`TransportError::Disconnected`](crate::error::TransportError::Disconnected).
    async fn receive_chunk(&self, max_bytes: usize) -> Result<Vec<u8>>;

    /// Close the link. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;

    /// Transport type name.
    fn transport_type(&self) -> &'static str;
}

/// Connect to `host:port` over TCP.
pub async fn connect(host: &str, port: u16, config: &TransportConfig) -> Result<TcpConnection> {
    TcpConnection::connect(host, port, config).await
}
