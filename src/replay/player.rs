//! Streams telemetry records over the link at a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::record::TelemetryRecord;
use super::ReplayConfig;
use crate::error::Result;
use crate::session::{CancellationToken, StopReason};
use crate::transport::Transport;

/// Result of a replay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub sent: usize,
    pub total: usize,
    /// `None` when every record went out.
    pub stopped: Option<StopReason>,
}

impl ReplayOutcome {
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none() && self.sent == self.total
    }
}

/// Sends one JSON document per record.
pub struct ReplaySession {
    transport: Arc<dyn Transport>,
    token: CancellationToken,
    interval: Duration,
    line_delimited: bool,
}

impl ReplaySession {
    pub fn new(transport: Arc<dyn Transport>, token: CancellationToken) -> Self {
        let defaults = ReplayConfig::default();
        Self {
            transport,
            token,
            interval: defaults.record_interval,
            line_delimited: defaults.line_delimited,
        }
    }

    /// Apply cadence and framing from `config`.
    pub fn with_config(mut self, config: &ReplayConfig) -> Self {
        self.interval = config.record_interval;
        self.line_delimited = config.line_delimited;
        self
    }

    /// Send `records` in order, calling `on_sent` with the running count
    /// after each one. Stops early when the token is set.
    pub async fn run<F>(&self, records: &[TelemetryRecord], mut on_sent: F) -> Result<ReplayOutcome>
    where
        F: FnMut(usize, &TelemetryRecord),
    {
        let total = records.len();
        let mut sent = 0;

        for record in records {
            if self.token.is_stopped() {
                break;
            }

            let mut blob = record.to_json()?;
            if self.line_delimited {
                blob.push('\n');
            }

            if let Err(e) = self.transport.send(blob.as_bytes()).await {
                warn!(sent, total, error = %e, "Replay send failed");
                self.token.request_stop(StopReason::SendFailed);
                return Err(e);
            }
            sent += 1;
            debug!(sent, total, time = %record.time, "Record sent");
            on_sent(sent, record);

            if sent < total {
                tokio::select! {
                    _ = self.token.stopped() => {}
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        let outcome = ReplayOutcome {
            sent,
            total,
            stopped: self.token.reason(),
        };
        info!(sent, total, stopped = ?outcome.stopped, "Replay finished");
        Ok(outcome)
    }
}
