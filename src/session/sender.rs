//! Foreground send loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::cancel::{CancellationToken, StopReason};
use super::STOP_COMMAND;
use crate::error::{InputError, Result};
use crate::protocol::{encode_value, DataKind, Value};
use crate::transport::Transport;

/// Default pause between two sends.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Source of operator commands.
///
/// `None` from either read means the operator is done.
#[async_trait]
pub trait OperatorInput: Send {
    /// Read the next type code, as typed.
    async fn read_type_code(&mut self) -> Result<Option<String>>;

    /// Read the value to send for `kind`.
    async fn read_value(&mut self, kind: DataKind) -> Result<Option<String>>;

    /// Called after a frame went out.
    fn sent(&mut self, _kind: DataKind, _value: &Value) {}

    /// Called when input was rejected. The session then asks again.
    fn rejected(&mut self, _error: &InputError) {}
}

/// Counters and stop reason for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub sent: u64,
    pub rejected: u64,
    pub reason: StopReason,
}

/// Turn a typed type code into a sendable kind.
pub fn parse_type_code(input: &str) -> std::result::Result<DataKind, InputError> {
    let trimmed = input.trim();
    let code: u8 = trimmed
        .parse()
        .map_err(|_| InputError::InvalidTypeCode(trimmed.to_string()))?;

    let kind = DataKind::from_code(code);
    if kind.is_unknown() {
        return Err(InputError::UnknownTypeCode(code));
    }
    if !kind.is_sendable() {
        return Err(InputError::NotSendable(kind));
    }
    Ok(kind)
}

fn is_stop(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(STOP_COMMAND)
}

/// Sends operator-chosen values at a fixed cadence.
pub struct SendSession {
    transport: Arc<dyn Transport>,
    token: CancellationToken,
    interval: Duration,
    sent: u64,
    rejected: u64,
}

impl SendSession {
    pub fn new(transport: Arc<dyn Transport>, token: CancellationToken) -> Self {
        Self {
            transport,
            token,
            interval: DEFAULT_SEND_INTERVAL,
            sent: 0,
            rejected: 0,
        }
    }

    /// Set the pause between sends.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Encode and write one value. A write failure sets the token.
    pub async fn send_value(&self, kind: DataKind, value: &Value) -> Result<()> {
        let frame = encode_value(kind, value)?;

        if let Err(e) = self.transport.send(&frame).await {
            warn!(kind = %kind, error = %e, "Send failed");
            self.token.request_stop(StopReason::SendFailed);
            return Err(e);
        }

        debug!(
            type_code = kind.code(),
            kind = %kind,
            len = frame.len(),
            value = %value,
            "Frame sent"
        );
        Ok(())
    }

    /// Prompt, validate, send, wait. Repeats until the operator stops, the
    /// token is set elsewhere, or a send fails.
    pub async fn run<I>(&mut self, input: &mut I) -> Result<SendOutcome>
    where
        I: OperatorInput + ?Sized,
    {
        loop {
            if self.token.is_stopped() {
                break;
            }

            let Some(raw_code) = self.read(input.read_type_code()).await? else {
                break;
            };

            let kind = match parse_type_code(&raw_code) {
                Ok(kind) => kind,
                Err(e) => {
                    self.reject(input, e);
                    continue;
                }
            };

            let Some(raw_value) = self.read(input.read_value(kind)).await? else {
                break;
            };

            let value = match Value::parse(kind, &raw_value) {
                Ok(value) => value,
                Err(e) => {
                    self.reject(input, e);
                    continue;
                }
            };

            self.send_value(kind, &value).await?;
            self.sent += 1;
            input.sent(kind, &value);

            tokio::select! {
                _ = self.token.stopped() => {}
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        let reason = self.token.reason().unwrap_or(StopReason::Operator);
        info!(sent = self.sent, rejected = self.rejected, %reason, "Send session ended");

        Ok(SendOutcome {
            sent: self.sent,
            rejected: self.rejected,
            reason,
        })
    }

    /// Race an operator read against the token. `None` means stop; the
    /// operator's own stop sets the token.
    async fn read<F>(&self, read: F) -> Result<Option<String>>
    where
        F: std::future::Future<Output = Result<Option<String>>>,
    {
        let line = tokio::select! {
            _ = self.token.stopped() => return Ok(None),
            line = read => line?,
        };

        match line {
            Some(line) if !is_stop(&line) => Ok(Some(line)),
            _ => {
                self.token.request_stop(StopReason::Operator);
                Ok(None)
            }
        }
    }

    fn reject<I>(&mut self, input: &mut I, error: InputError)
    where
        I: OperatorInput + ?Sized,
    {
        debug!(error = %error, "Input rejected");
        self.rejected += 1;
        input.rejected(&error);
    }
}
