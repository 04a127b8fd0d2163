//! Background receive loop.
//!
//! ```text
//!            timeout / frame / dropped frame
//!               ┌──────────┐
//!               ▼          │
//!          ┌───────────┐───┘
//!          │ Listening │──── token stopped ────▶ Stopped
//!          └───────────┘──── zero-length read ─▶ Disconnected
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tracing::{debug, info, warn};

use super::cancel::{CancellationToken, StopReason};
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::protocol::{FrameCodec, Packet, MAX_FRAME_SIZE};
use crate::transport::{Transport, TransportConfig};

/// Something the loop observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// A frame that decoded cleanly.
    Packet(Packet),
    /// A malformed frame or garbage run that was discarded.
    Dropped(ProtocolError),
}

/// Terminal state of a receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The token was set by someone else, or the connection was closed locally.
    Stopped,
    /// The peer closed the connection.
    Disconnected,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub reads: u64,
    pub bytes: u64,
    pub packets: u64,
    pub dropped: u64,
}

/// Outcome plus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveReport {
    pub outcome: ReceiveOutcome,
    pub stats: ReceiveStats,
}

/// Drains and decodes inbound frames until stopped or disconnected.
pub struct ReceiveLoop {
    transport: Arc<dyn Transport>,
    token: CancellationToken,
    events: mpsc::Sender<ReceiveEvent>,
    poll_interval: Duration,
    chunk_size: usize,
    codec: FrameCodec,
    buffer: BytesMut,
    stats: ReceiveStats,
}

impl ReceiveLoop {
    /// Create a loop with default transport settings.
    pub fn new(
        transport: Arc<dyn Transport>,
        token: CancellationToken,
        events: mpsc::Sender<ReceiveEvent>,
    ) -> Self {
        let defaults = TransportConfig::default();
        Self {
            transport,
            token,
            events,
            poll_interval: defaults.poll_interval,
            chunk_size: defaults.recv_chunk_size,
            codec: FrameCodec::new(),
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE * 2),
            stats: ReceiveStats::default(),
        }
    }

    /// Apply poll interval and chunk size from `config`.
    pub fn with_config(mut self, config: &TransportConfig) -> Self {
        self.poll_interval = config.poll_interval;
        self.chunk_size = config.recv_chunk_size;
        self
    }

    /// Run until a terminal state.
    ///
    /// Transport failures other than disconnect and local close are returned
    /// as errors after the token is set.
    pub async fn run(mut self) -> Result<ReceiveReport> {
        debug!(poll_interval = ?self.poll_interval, "Receive loop started");

        let outcome = loop {
            if self.token.is_stopped() {
                break ReceiveOutcome::Stopped;
            }

            let ready = tokio::select! {
                biased;
                _ = self.token.stopped() => continue,
                ready = self.transport.poll_readable(self.poll_interval) => ready,
            };

            match ready {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => match self.classify(e)? {
                    Some(outcome) => break outcome,
                    None => continue,
                },
            }

            // Readiness can be spurious; the read gets the same bound as the poll
            let read = tokio::select! {
                biased;
                _ = self.token.stopped() => continue,
                read = timeout(
                    self.poll_interval,
                    self.transport.receive_chunk(self.chunk_size),
                ) => read,
            };

            let Ok(read) = read else {
                debug!("Readable socket produced no data within the poll interval");
                continue;
            };

            match read {
                Ok(chunk) => {
                    self.stats.reads += 1;
                    self.stats.bytes += chunk.len() as u64;
                    if !self.ingest(&chunk).await? {
                        self.token.request_stop(StopReason::Shutdown);
                        break ReceiveOutcome::Stopped;
                    }
                }
                Err(e) => {
                    if let Some(outcome) = self.classify(e)? {
                        break outcome;
                    }
                }
            }
        };

        info!(
            ?outcome,
            packets = self.stats.packets,
            dropped = self.stats.dropped,
            "Receive loop exited"
        );

        Ok(ReceiveReport {
            outcome,
            stats: self.stats,
        })
    }

    /// Map a transport error to a terminal state, or propagate it.
    fn classify(&self, err: Error) -> Result<Option<ReceiveOutcome>> {
        match err {
            Error::Transport(TransportError::Disconnected) => {
                self.token.request_stop(StopReason::Disconnected);
                Ok(Some(ReceiveOutcome::Disconnected))
            }
            Error::Transport(TransportError::ConnectionClosed) => {
                self.token.request_stop(StopReason::Shutdown);
                Ok(Some(ReceiveOutcome::Stopped))
            }
            other => {
                warn!(error = %other, "Receive failed");
                self.token.request_stop(StopReason::Disconnected);
                Err(other)
            }
        }
    }

    /// Feed a chunk through the codec and emit everything it yields.
    /// Returns false once nobody is listening for events.
    async fn ingest(&mut self, chunk: &[u8]) -> Result<bool> {
        self.buffer.extend_from_slice(chunk);

        loop {
            let event = match self.codec.decode(&mut self.buffer) {
                Ok(Some(packet)) => {
                    debug!(
                        type_code = packet.type_code(),
                        kind = %packet.kind(),
                        len = packet.payload().len(),
                        "Frame received"
                    );
                    self.stats.packets += 1;
                    ReceiveEvent::Packet(packet)
                }
                Ok(None) => return Ok(true),
                Err(Error::Protocol(e)) => {
                    warn!(error = %e, "Dropped malformed frame");
                    self.stats.dropped += 1;
                    ReceiveEvent::Dropped(e)
                }
                Err(e) => return Err(e),
            };

            if self.events.send(event).await.is_err() {
                return Ok(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted reads; an empty chunk stands for EOF.
    #[derive(Default)]
    struct ScriptedTransport {
        chunks: Mutex<VecDeque<Vec<u8>>>,
        reads: AtomicUsize,
        polls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn with_chunks(chunks: Vec<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                chunks: Mutex::new(chunks.into()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn peer_addr(&self) -> Option<SocketAddr> {
            None
        }

        async fn send(&self, _frame: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn poll_readable(&self, timeout: Duration) -> Result<bool> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.chunks.lock().is_empty() {
                tokio::time::sleep(timeout).await;
                return Ok(false);
            }
            Ok(true)
        }

        async fn receive_chunk(&self, _max_bytes: usize) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            match self.chunks.lock().pop_front() {
                Some(chunk) if chunk.is_empty() => Err(TransportError::Disconnected.into()),
                Some(chunk) => Ok(chunk),
                None => Err(TransportError::ReceiveFailed("script exhausted".into()).into()),
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }

        fn transport_type(&self) -> &'static str {
            "scripted"
        }
    }

    fn fast_config() -> TransportConfig {
        TransportConfig {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stopped_token_exits_without_read() {
        let transport = ScriptedTransport::with_chunks(vec![encode_frame(6, &[0, 1]).unwrap()]);
        let token = CancellationToken::new();
        token.request_stop(StopReason::Operator);
        let (tx, _rx) = mpsc::channel(8);

        let report = ReceiveLoop::new(transport.clone(), token, tx)
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, ReceiveOutcome::Stopped);
        assert_eq!(transport.reads.load(Ordering::SeqCst), 0);
        assert_eq!(transport.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_length_read_sets_token() {
        let transport = ScriptedTransport::with_chunks(vec![
            encode_frame(5, &[0x00, 0x5A]).unwrap(),
            Vec::new(),
        ]);
        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(8);

        let report = ReceiveLoop::new(transport, token.clone(), tx)
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, ReceiveOutcome::Disconnected);
        assert!(token.is_stopped());
        assert_eq!(token.reason(), Some(StopReason::Disconnected));
        assert_eq!(report.stats.packets, 1);

        match rx.recv().await {
            Some(ReceiveEvent::Packet(p)) => assert_eq!(p.type_code(), 5),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_end_loop() {
        let mut bad = encode_frame(6, &[0, 1]).unwrap();
        bad[6] ^= 0x40;
        let transport = ScriptedTransport::with_chunks(vec![
            bad,
            encode_frame(7, &[0, 30]).unwrap(),
            Vec::new(),
        ]);
        let (tx, mut rx) = mpsc::channel(8);

        let report = ReceiveLoop::new(transport, CancellationToken::new(), tx)
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, ReceiveOutcome::Disconnected);
        assert!(report.stats.dropped >= 1);
        assert_eq!(report.stats.packets, 1);

        let mut packets = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ReceiveEvent::Packet(p) = event {
                packets.push(p.type_code());
            }
        }
        assert_eq!(packets, vec![7]);
    }

    #[tokio::test]
    async fn test_cancel_while_idle() {
        let transport = ScriptedTransport::with_chunks(Vec::new());
        let token = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(8);

        let handle = tokio::spawn(
            ReceiveLoop::new(transport, token.clone(), tx)
                .with_config(&fast_config())
                .run(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.request_stop(StopReason::Operator);

        let report = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, ReceiveOutcome::Stopped);
        assert_eq!(token.reason(), Some(StopReason::Operator));
    }

    #[tokio::test]
    async fn test_coalesced_chunk_yields_every_frame() {
        let mut chunk = encode_frame(6, &[0x05, 0xDC]).unwrap();
        chunk.extend(encode_frame(3, b"12.9,77.6").unwrap());
        let transport = ScriptedTransport::with_chunks(vec![chunk, Vec::new()]);
        let (tx, mut rx) = mpsc::channel(8);

        let report = ReceiveLoop::new(transport, CancellationToken::new(), tx)
            .run()
            .await
            .unwrap();
        assert_eq!(report.stats.packets, 2);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, ReceiveEvent::Packet(ref p) if p.type_code() == 6));
        assert!(matches!(second, ReceiveEvent::Packet(ref p) if p.type_code() == 3));
    }

    /// Always reports readable, never delivers a byte.
    struct SpuriousTransport;

    #[async_trait]
    impl Transport for SpuriousTransport {
        fn peer_addr(&self) -> Option<SocketAddr> {
            None
        }

        async fn send(&self, _frame: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn poll_readable(&self, _timeout: Duration) -> Result<bool> {
            Ok(true)
        }

        async fn receive_chunk(&self, _max_bytes: usize) -> Result<Vec<u8>> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }

        fn transport_type(&self) -> &'static str {
            "spurious"
        }
    }

    #[tokio::test]
    async fn test_stop_observed_during_stalled_read() {
        let token = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(8);

        let handle = tokio::spawn(
            ReceiveLoop::new(Arc::new(SpuriousTransport), token.clone(), tx)
                .with_config(&fast_config())
                .run(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.request_stop(StopReason::Operator);

        let report = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, ReceiveOutcome::Stopped);
        assert_eq!(report.stats.reads, 0);
    }

    #[tokio::test]
    async fn test_bad_length_byte_does_not_hold_back_later_frames() {
        let mut bad = encode_frame(5, &[0x00, 0x5A]).unwrap();
        bad[3] = 0x40;
        let mut chunks = vec![bad];
        for rpm in 1..=5u8 {
            chunks.push(encode_frame(6, &[0x00, rpm]).unwrap());
        }
        chunks.push(Vec::new());
        let transport = ScriptedTransport::with_chunks(chunks);
        let (tx, mut rx) = mpsc::channel(16);

        let report = ReceiveLoop::new(transport, CancellationToken::new(), tx)
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, ReceiveOutcome::Disconnected);
        assert_eq!(report.stats.packets, 5);
        assert_eq!(report.stats.dropped, 1);

        let first = rx.recv().await.unwrap();
        assert_eq!(first, ReceiveEvent::Dropped(ProtocolError::Truncated));
        let mut readings = Vec::new();
        while let Ok(ReceiveEvent::Packet(p)) = rx.try_recv() {
            readings.push(p.reading());
        }
        assert_eq!(
            readings,
            (1..=5).map(crate::protocol::Reading::Integer).collect::<Vec<_>>()
        );
    }
}
