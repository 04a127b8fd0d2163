//! Session layer: one connection, the loops that use it, and their lifecycle.
//!
//! A [`Session`] owns the connection and every task it spawns. Each activity
//! (receive, send, replay) runs under its own [`CancellationToken`]; tasks are
//! joined before the connection is closed, so no loop outlives its socket.

mod cancel;
mod receiver;
mod sender;

pub use cancel::{CancellationToken, StopReason};
pub use receiver::{ReceiveEvent, ReceiveLoop, ReceiveOutcome, ReceiveReport, ReceiveStats};
pub use sender::{parse_type_code, OperatorInput, SendOutcome, SendSession, DEFAULT_SEND_INTERVAL};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{DataKind, Value};
use crate::transport::{self, Transport, TransportConfig};

/// Line the operator types to stop the active activity.
pub const STOP_COMMAND: &str = "q";

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pause between two operator sends.
    #[serde(default = "default_send_interval", with = "humantime_serde")]
    pub send_interval: Duration,

    /// Capacity of the receive event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_send_interval() -> Duration {
    DEFAULT_SEND_INTERVAL
}

fn default_event_buffer() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_interval: default_send_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Handle to a running receive loop.
struct ReceiverTask {
    token: CancellationToken,
    task: JoinHandle<Result<ReceiveReport>>,
}

/// A connected session.
pub struct Session {
    transport: Arc<dyn Transport>,
    transport_config: TransportConfig,
    config: SessionConfig,
    receiver: Option<ReceiverTask>,
    link_lost: AtomicBool,
}

impl Session {
    /// Connect over TCP.
    pub async fn connect(
        host: &str,
        port: u16,
        transport_config: TransportConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let connection = transport::connect(host, port, &transport_config).await?;
        Ok(Self::new(Arc::new(connection), transport_config, config))
    }

    /// Wrap an existing transport.
    pub fn new(
        transport: Arc<dyn Transport>,
        transport_config: TransportConfig,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            transport_config,
            config,
            receiver: None,
            link_lost: AtomicBool::new(false),
        }
    }

    /// Shared handle to the underlying transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// False once the peer went away, a send failed, or the session closed.
    pub fn is_connected(&self) -> bool {
        !self.link_lost.load(Ordering::SeqCst) && !self.transport.is_closed()
    }

    /// Whether a receive loop is running.
    pub fn is_receiving(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Spawn the receive loop in the background.
    ///
    /// Returns the loop's token and the event stream. A loop that is already
    /// running is stopped and joined first.
    pub async fn start_receiving(
        &mut self,
    ) -> Result<(CancellationToken, mpsc::Receiver<ReceiveEvent>)> {
        self.stop_receiving().await?;

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let receive_loop = ReceiveLoop::new(self.transport(), token.clone(), tx)
            .with_config(&self.transport_config);

        let task = tokio::spawn(receive_loop.run());
        self.receiver = Some(ReceiverTask {
            token: token.clone(),
            task,
        });

        debug!("Receive loop spawned");
        Ok((token, rx))
    }

    /// Stop and join the receive loop, if one is running.
    pub async fn stop_receiving(&mut self) -> Result<Option<ReceiveReport>> {
        let Some(receiver) = self.receiver.take() else {
            return Ok(None);
        };

        receiver.token.request_stop(StopReason::Operator);
        let report = receiver
            .task
            .await
            .map_err(|e| Error::Internal(format!("receive task failed: {e}")))?;

        match report {
            Ok(report) => {
                if report.outcome == ReceiveOutcome::Disconnected {
                    self.link_lost.store(true, Ordering::SeqCst);
                }
                Ok(Some(report))
            }
            Err(e) => {
                self.note_failure(&e);
                Err(e)
            }
        }
    }

    /// A send session under a fresh token.
    pub fn sender(&self) -> (CancellationToken, SendSession) {
        let token = CancellationToken::new();
        let session = SendSession::new(self.transport(), token.clone())
            .with_interval(self.config.send_interval);
        (token, session)
    }

    /// Run a send session from [`Session::sender`] to completion.
    pub async fn run_sender<I>(
        &self,
        mut sender: SendSession,
        input: &mut I,
    ) -> Result<SendOutcome>
    where
        I: OperatorInput + ?Sized,
    {
        let result = sender.run(input).await;
        if let Err(ref e) = result {
            self.note_failure(e);
        }
        result
    }

    /// Send a single value outside any loop.
    pub async fn send_once(&self, kind: DataKind, value: &Value) -> Result<()> {
        let (_, session) = self.sender();
        let result = session.send_value(kind, value).await;
        if let Err(ref e) = result {
            self.note_failure(e);
        }
        result
    }

    /// Record a session-ending error.
    pub fn note_failure(&self, err: &Error) {
        if err.ends_session() {
            warn!(error = %err, "Link lost");
            self.link_lost.store(true, Ordering::SeqCst);
        }
    }

    /// Join every task, then close the connection.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.stop_receiving().await {
            debug!(error = %e, "Receive loop ended with error");
        }
        self.transport.close().await?;
        info!("Session closed");
        Ok(())
    }
}
