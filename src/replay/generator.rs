//! Synthetic sensor data.
//!
//! Each channel is a sine wave between its min and max at its own frequency,
//! with multiplicative noise on top. Phase currents share one frequency and
//! are 120° apart.

use std::f64::consts::PI;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::record::{TelemetryRecord, COLUMNS};
use crate::error::{Error, Result};

/// Timestamp format of the `Time` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Generator settings.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub duration_secs: u32,
    pub sample_rate_hz: u32,
    /// Relative noise amplitude, e.g. 0.02 for ±2 %.
    pub noise: f64,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            duration_secs: 1000,
            sample_rate_hz: 10,
            noise: 0.02,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Reject settings the sampler cannot use.
    pub fn validate(&self) -> Result<()> {
        if !self.noise.is_finite() || !(0.0..=1.0).contains(&self.noise) {
            return Err(Error::InvalidConfig(format!(
                "noise must be between 0 and 1, got {}",
                self.noise
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(Error::InvalidConfig("sample rate must be at least 1 Hz".into()));
        }
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.duration_secs as usize * self.sample_rate_hz as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct Wave {
    min: f64,
    max: f64,
    freq: f64,
    phase: f64,
}

impl Wave {
    const fn new(min: f64, max: f64, freq: f64) -> Self {
        Self {
            min,
            max,
            freq,
            phase: 0.0,
        }
    }

    const fn shifted(self, phase: f64) -> Self {
        Self { phase, ..self }
    }

    fn at(&self, t: f64) -> f64 {
        let mid = (self.max + self.min) / 2.0;
        let amplitude = (self.max - self.min) / 2.0;
        mid + amplitude * (2.0 * PI * self.freq * t + self.phase).sin()
    }
}

const BUS_VOLTAGE: Wave = Wave::new(85.0, 95.0, 0.03);
const BUS_CURRENT: Wave = Wave::new(-20.0, 120.0, 0.08);
const RPM: Wave = Wave::new(0.0, 2500.0, 0.05);
const TORQUE: Wave = Wave::new(0.0, 190.0, 0.06);
const THROTTLE: Wave = Wave::new(0.0, 5.0, 0.02);
const SOC: Wave = Wave::new(20.0, 100.0, 0.01);

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Produces sensor records.
pub struct Generator<R> {
    config: GeneratorConfig,
    rng: R,
}

impl Generator<ChaCha8Rng> {
    /// Seeded from `config.seed`, or from entropy when unset.
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Generator<R> {
    pub fn with_rng(config: GeneratorConfig, rng: R) -> Self {
        Self { config, rng }
    }

    fn noisy(&mut self, value: f64) -> f64 {
        // Unvalidated configs fall back to clean waves rather than an empty range
        if !self.config.noise.is_finite() || self.config.noise <= 0.0 {
            return value;
        }
        let factor = self.rng.gen_range(-self.config.noise..=self.config.noise);
        value + factor * value
    }

    /// Sample at `t` seconds after `start`.
    pub fn sample(&mut self, start: DateTime<Local>, t: f64) -> TelemetryRecord {
        let time = start + chrono::Duration::milliseconds((t * 1000.0).round() as i64);
        let phase_u = BUS_CURRENT;
        let phase_v = BUS_CURRENT.shifted(2.0 * PI / 3.0);
        let phase_w = BUS_CURRENT.shifted(4.0 * PI / 3.0);

        let values = [
            round_to(self.noisy(BUS_VOLTAGE.at(t)), 2),
            round_to(self.noisy(BUS_CURRENT.at(t)), 2),
            self.noisy(RPM.at(t)).round(),
            round_to(self.noisy(TORQUE.at(t)), 2),
            round_to(self.noisy(phase_u.at(t)), 2),
            round_to(self.noisy(phase_v.at(t)), 2),
            round_to(self.noisy(phase_w.at(t)), 2),
            round_to(self.noisy(THROTTLE.at(t)), 2),
            round_to(self.noisy(SOC.at(t)), 1),
        ];

        TelemetryRecord::from_columns(time.format(TIME_FORMAT).to_string(), values)
    }

    /// Every sample for the configured duration.
    pub fn generate(&mut self, start: DateTime<Local>) -> Vec<TelemetryRecord> {
        let rate = self.config.sample_rate_hz.max(1) as f64;
        (0..self.config.sample_count())
            .map(|i| self.sample(start, i as f64 / rate))
            .collect()
    }
}

/// Write records as CSV with a header row.
pub fn write_csv<W: Write>(mut writer: W, records: &[TelemetryRecord]) -> Result<()> {
    writeln!(writer, "{}", COLUMNS.join(","))?;
    for record in records {
        writeln!(writer, "{}", record.to_csv_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Generate a file starting now. Returns the number of rows written.
pub fn generate_file(path: impl AsRef<Path>, config: GeneratorConfig) -> Result<usize> {
    config.validate()?;
    let path = path.as_ref();
    let records = Generator::new(config).generate(Local::now());

    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), &records)?;

    info!(path = %path.display(), rows = records.len(), "Generated sensor data");
    Ok(records.len())
}
