//! Operator console over stdin/stdout.

use std::io::Write;

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::{InputError, Result};
use crate::protocol::{DataKind, Value};
use crate::session::{CancellationToken, OperatorInput, ReceiveEvent, StopReason, STOP_COMMAND};

/// Line-oriented console. The only reader of stdin for the whole process.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and read one trimmed line. `None` on end of input.
    pub async fn prompt(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }

    /// Block until the operator types the stop command or `token` is set
    /// elsewhere.
    pub async fn wait_for_stop(&mut self, token: &CancellationToken) -> Result<()> {
        loop {
            let line = tokio::select! {
                _ = token.stopped() => return Ok(()),
                line = self.lines.next_line() => line?,
            };

            match line {
                Some(line) if line.trim() == STOP_COMMAND => {
                    token.request_stop(StopReason::Operator);
                    return Ok(());
                }
                Some(_) => {
                    println!("{} type '{}' to stop", "→".cyan(), STOP_COMMAND);
                }
                None => {
                    // stdin closed; only the token can end the wait now
                    token.stopped().await;
                    return Ok(());
                }
            }
        }
    }

    /// Print the sendable type codes.
    pub fn print_kinds(&self) {
        println!("{}", "Type codes:".bright_white().bold());
        for kind in DataKind::sendable() {
            println!("  {:>2}  {}", kind.code(), kind);
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorInput for Console {
    async fn read_type_code(&mut self) -> Result<Option<String>> {
        self.prompt(&format!("Type code ('{STOP_COMMAND}' to stop): "))
            .await
    }

    async fn read_value(&mut self, kind: DataKind) -> Result<Option<String>> {
        self.prompt(&format!("Value for {kind}: ")).await
    }

    fn sent(&mut self, kind: DataKind, value: &Value) {
        println!("{} Sent {} = {}", "✓".green(), kind, value);
    }

    fn rejected(&mut self, error: &InputError) {
        println!("{} {}", "✗".red(), error);
    }
}

/// Print one receive event.
pub fn print_event(event: &ReceiveEvent) {
    match event {
        ReceiveEvent::Packet(packet) => {
            println!(
                "{} {}  {}",
                "←".cyan(),
                packet,
                format!("({})", packet.value()).dimmed()
            );
        }
        ReceiveEvent::Dropped(err) => {
            println!("{} dropped frame: {}", "⚠".yellow(), err);
        }
    }
}
