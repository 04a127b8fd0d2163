//! Bulk telemetry replay.
//!
//! Rows from a sensor CSV file are turned into JSON documents and written to
//! the link one at a time. The link treats each document as an opaque blob.

mod generator;
mod player;
mod reader;
mod record;

pub use generator::{generate_file, write_csv, Generator, GeneratorConfig, TIME_FORMAT};
pub use player::{ReplayOutcome, ReplaySession};
pub use reader::{parse_records, read_records};
pub use record::{MotorData, PhaseCurrents, SystemStatus, TelemetryRecord, COLUMNS};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Default sensor file.
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// Pause between records.
    #[serde(default = "default_record_interval", with = "humantime_serde")]
    pub record_interval: Duration,

    /// Append a newline after each document.
    #[serde(default)]
    pub line_delimited: bool,
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("sensor_data.csv")
}

fn default_record_interval() -> Duration {
    Duration::from_millis(100)
}

impl ReplayConfig {
    /// Apply command line overrides.
    pub fn apply_overrides(
        &mut self,
        csv_path: Option<PathBuf>,
        interval_ms: Option<u64>,
        line_delimited: bool,
    ) {
        if let Some(path) = csv_path {
            self.csv_path = path;
        }
        if let Some(ms) = interval_ms {
            self.record_interval = Duration::from_millis(ms);
        }
        self.line_delimited |= line_delimited;
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            record_interval: default_record_interval(),
            line_delimited: false,
        }
    }
}
