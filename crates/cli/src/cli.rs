//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use contracts::DeliveryMode;

/// Relay - deliver payloads to a rotating set of HTTP endpoints
#[derive(Parser, Debug)]
#[command(
    name = "relay",
    author,
    version,
    about = "Round-robin payload relay with per-endpoint circuit breaking",
    long_about = "Delivers payloads to a set of endpoints, one worker per endpoint.\n\n\
                  Endpoints that fail repeatedly inside the retry window are excluded \n\
                  for the retry timeout, then rejoin the rotation automatically."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Emit payloads to the configured endpoints
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Endpoint URL, repeatable; added to those from the config file
    #[arg(short, long = "endpoint", value_name = "URL")]
    pub endpoints: Vec<String>,

    /// Override the delivery mode
    #[arg(long, value_enum)]
    pub delivery_mode: Option<DeliveryModeArg>,

    /// Override the number of failures tolerated inside the retry window
    #[arg(long)]
    pub retry_limit: Option<usize>,

    /// Delay between generated payloads in milliseconds
    #[arg(long, default_value = "1000", env = "RELAY_INTERVAL_MS")]
    pub interval_ms: u64,

    /// Number of payloads to emit (0 = unlimited)
    #[arg(long, default_value = "0", env = "RELAY_COUNT")]
    pub count: u64,

    /// Read payloads from stdin, one per line, instead of generating them
    #[arg(long)]
    pub stdin: bool,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "RELAY_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Delivery mode as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeliveryModeArg {
    RoundRobin,
    Broadcast,
}

impl From<DeliveryModeArg> for DeliveryMode {
    fn from(arg: DeliveryModeArg) -> Self {
        match arg {
            DeliveryModeArg::RoundRobin => DeliveryMode::RoundRobin,
            DeliveryModeArg::Broadcast => DeliveryMode::Broadcast,
        }
    }
}
