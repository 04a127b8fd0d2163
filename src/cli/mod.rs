//! Command line interface for Mazout.

mod console;

pub use console::{print_event, Console};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Mazout - telemetry and control link client
#[derive(Parser, Debug)]
#[command(
    name = "mazout",
    author,
    version,
    about = "Telemetry and control link client for remote vehicle controllers",
    long_about = r#"
Mazout talks to a device server over a single TCP connection using a compact
binary frame format:

  AA BB <type> <len> <payload...> <xor checksum> CC

It can send individual readings and commands, print every frame the device
sends back, and replay recorded sensor data as JSON telemetry.

QUICK START:
  Interactive:  mazout connect --host 10.0.0.5
  Listen:       mazout listen
  One-shot:     mazout send --type 6 --value 1500
  Replay:       mazout generate && mazout replay sensor_data.csv
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive session (menu driven)
    Connect(LinkArgs),

    /// Print every frame the device sends
    Listen(LinkArgs),

    /// Send a single value and exit
    Send(SendArgs),

    /// Stream a sensor CSV file as JSON telemetry
    Replay(ReplayArgs),

    /// Generate a synthetic sensor CSV file
    Generate(GenerateArgs),

    /// Encode or decode a frame offline
    #[command(subcommand)]
    Frame(FrameCommand),

    /// Show example configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Device server address, overriding the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// Device server host
    #[arg(long)]
    pub host: Option<String>,

    /// Device server port
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Send command arguments
#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,

    /// Type code (3-12)
    #[arg(short = 't', long = "type")]
    pub type_code: String,

    /// Value to send
    #[arg(short, long, allow_hyphen_values = true)]
    pub value: String,
}

/// Replay command arguments
#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub link: LinkArgs,

    /// Sensor CSV file (defaults to replay.csv_path)
    pub file: Option<PathBuf>,

    /// Pause between records in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Terminate each JSON document with a newline
    #[arg(long)]
    pub lines: bool,
}

/// Generate command arguments
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Output path
    #[arg(short, long, default_value = "sensor_data.csv")]
    pub output: PathBuf,

    /// Duration in seconds
    #[arg(short, long, default_value = "1000")]
    pub duration: u32,

    /// Samples per second
    #[arg(short, long, default_value = "10")]
    pub rate: u32,

    /// Relative noise amplitude
    #[arg(long, default_value = "0.02")]
    pub noise: f64,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Offline frame tools
#[derive(Subcommand, Debug)]
pub enum FrameCommand {
    /// Encode a value and print the frame as hex
    Encode {
        /// Type code (1-12, or any byte for raw hex payloads)
        #[arg(short = 't', long = "type")]
        type_code: u8,

        /// Value, using the kind's convention
        #[arg(short, long, allow_hyphen_values = true)]
        value: String,
    },

    /// Decode a hex frame
    Decode {
        /// Frame bytes as hex (spaces allowed)
        hex: Vec<String>,
    },
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Completions command arguments
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

/// Shell for completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

impl From<Shell> for clap_complete::Shell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => Self::Bash,
            Shell::Zsh => Self::Zsh,
            Shell::Fish => Self::Fish,
            Shell::PowerShell => Self::PowerShell,
        }
    }
}
