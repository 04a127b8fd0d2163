//! Cooperative stop signal shared by a session's loops.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken as Signal;
use tracing::debug;

/// Why a loop was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operator typed the stop command or pressed Ctrl+C.
    Operator,
    /// The peer closed the connection.
    Disconnected,
    /// A write failed.
    SendFailed,
    /// The session is being torn down.
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Operator => write!(f, "operator"),
            StopReason::Disconnected => write!(f, "peer disconnected"),
            StopReason::SendFailed => write!(f, "send failed"),
            StopReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Monotonic active → stopped flag.
///
/// Clones share state. The first `request_stop` wins and records its reason;
/// later calls are no-ops. A new activity gets a new token rather than a reset.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    signal: Signal,
    reason: Mutex<Option<StopReason>>,
}

impl CancellationToken {
    /// Create an active token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns true if this call performed the transition.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        {
            let mut slot = self.inner.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }

        debug!(%reason, "Stop requested");
        self.inner.signal.cancel();
        true
    }

    /// Non-blocking read of the flag.
    pub fn is_stopped(&self) -> bool {
        self.inner.signal.is_cancelled()
    }

    /// Reason recorded by the first `request_stop`, if any.
    pub fn reason(&self) -> Option<StopReason> {
        *self.inner.reason.lock()
    }

    /// Resolve once the flag is set.
    pub async fn stopped(&self) {
        self.inner.signal.cancelled().await
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("stopped", &self.is_stopped())
            .field("reason", &self.reason())
            .finish()
    }
}
