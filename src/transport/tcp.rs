//! TCP link to the device server.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken as CloseSignal;
use tracing::{debug, info};

use super::{Transport, TransportConfig};
use crate::error::{Result, TransportError};

/// TCP connection owning one socket for the lifetime of a session.
pub struct TcpConnection {
    /// Read half, used by the receive loop only.
    reader: Mutex<OwnedReadHalf>,
    /// Write half. Taken out and shut down on close.
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Fired on close; every pending operation races against it.
    close_signal: CloseSignal,
    /// Guards the single logical close.
    closing: AtomicBool,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl TcpConnection {
    /// Resolve and connect. Fails fast; there is no retry.
    pub async fn connect(host: &str, port: u16, config: &TransportConfig) -> Result<Self> {
        let target = format!("{host}:{port}");

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&target)
            .await
            .map_err(|_| TransportError::Resolve(target.clone()))?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::Resolve(target).into());
        }

        let mut last_err = None;
        for addr in addrs {
            match timeout(config.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    if config.tcp_nodelay {
                        stream
                            .set_nodelay(true)
                            .map_err(|e| TransportError::ConnectFailed {
                                addr: target.clone(),
                                reason: e.to_string(),
                            })?;
                    }
                    let conn = Self::from_stream(stream)?;
                    info!(peer = %conn.peer_addr, "Connected");
                    return Ok(conn);
                }
                Ok(Err(e)) => {
                    debug!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(TransportError::ConnectFailed {
                        addr: target.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    last_err = Some(TransportError::ConnectTimeout(target.clone()));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| TransportError::Resolve(target))
            .into())
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(Some(writer)),
            close_signal: CloseSignal::new(),
            closing: AtomicBool::new(false),
            local_addr,
            peer_addr,
        })
    }

    /// Local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn ensure_open(&self) -> Result<()> {
        if self.close_signal.is_cancelled() {
            return Err(TransportError::ConnectionClosed.into());
        }
        Ok(())
    }
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

#[async_trait]
impl Transport for TcpConnection {
    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer_addr)
    }

    async fn send(&self, frame: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;

        // write_all retries partial writes until the frame is out or the socket fails
        let write = async {
            writer.write_all(frame).await?;
            writer.flush().await
        };

        tokio::select! {
            _ = self.close_signal.cancelled() => Err(TransportError::ConnectionClosed.into()),
            result = write => {
                result.map_err(|e| TransportError::SendFailed(e.to_string()))?;
                Ok(())
            }
        }
    }

    async fn poll_readable(&self, wait: Duration) -> Result<bool> {
        self.ensure_open()?;

        let reader = self.reader.lock().await;

        tokio::select! {
            _ = self.close_signal.cancelled() => Err(TransportError::ConnectionClosed.into()),
            ready = timeout(wait, reader.readable()) => match ready {
                Err(_) => Ok(false),
                Ok(Ok(())) => Ok(true),
                Ok(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string()).into()),
            },
        }
    }

    async fn receive_chunk(&self, max_bytes: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;

        let mut reader = self.reader.lock().await;
        let mut buf = vec![0u8; max_bytes];

        let read = tokio::select! {
            _ = self.close_signal.cancelled() => return Err(TransportError::ConnectionClosed.into()),
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => Err(TransportError::Disconnected.into()),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if is_peer_gone(&e) => Err(TransportError::Disconnected.into()),
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string()).into()),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Abort in-flight operations first so the writer lock frees up
        self.close_signal.cancel();

        let writer = { self.writer.lock().await.take() };
        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
        }

        info!(peer = %self.peer_addr, "Connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.close_signal.is_cancelled()
    }

    fn transport_type(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = TransportConfig::default();

        let (conn, accepted) = tokio::join!(
            TcpConnection::connect("127.0.0.1", addr.port(), &config),
            listener.accept()
        );
        (conn.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (conn, mut peer) = pair().await;
        conn.send(&[0xAA, 0xBB, 0x01]).await.unwrap();

        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xAA, 0xBB, 0x01]);
    }

    #[tokio::test]
    async fn test_poll_times_out_without_data() {
        let (conn, _peer) = pair().await;
        let ready = conn.poll_readable(Duration::from_millis(50)).await.unwrap();
        assert!(!ready);
    }

    #[tokio::test]
    async fn test_zero_length_read_is_disconnect() {
        let (conn, peer) = pair().await;
        drop(peer);

        assert!(conn.poll_readable(Duration::from_secs(1)).await.unwrap());
        let err = conn.receive_chunk(1024).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, _peer) = pair().await;
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());

        let err = conn.send(&[1]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::ConnectionClosed)
        ));
        let err = conn.receive_chunk(16).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::ConnectionClosed)
        ));
    }
}
