//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::Variant;
use std::path::PathBuf;

/// Keyed dispatch - load harness for single-worker keyed dispatchers
#[derive(Parser, Debug)]
#[command(
    name = "keyed-dispatch",
    author,
    version,
    about = "Load harness for keyed publish/subscribe dispatchers",
    long_about = "Drives a keyed dispatcher with producer threads and no-op consumers.\n\n\
                  Binds one consumer per topic, runs producers for a fixed duration \n\
                  and dumps per-key queue depths and delivery counters."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "KEYED_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "KEYED_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the load harness against one dispatcher variant
    Bench(BenchArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `bench` command
///
/// Flags override values from `--config`; without a file the defaults apply.
#[derive(Parser, Debug, Clone, Default)]
pub struct BenchArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "KEYED_DISPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dispatcher variant (locking, prebuilt, split-lock)
    #[arg(long, value_parser = parse_variant)]
    pub variant: Option<Variant>,

    /// Number of topics, each bound to its own consumer
    #[arg(long)]
    pub topics: Option<u64>,

    /// Number of producer threads
    #[arg(long)]
    pub producers: Option<usize>,

    /// Delay between two enqueues of one producer (microseconds)
    #[arg(long)]
    pub period_us: Option<u64>,

    /// Run duration in seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Queue capacity (per key, or global for split-lock)
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Payload size in bytes
    #[arg(long)]
    pub payload_bytes: Option<usize>,

    /// Deliver what is still queued when the dispatcher stops
    #[arg(long)]
    pub drain_on_stop: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Include empty queues in the final dump
    #[arg(long)]
    pub all_queues: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "KEYED_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bench.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file (defaults are shown without one)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

fn parse_variant(s: &str) -> Result<Variant, String> {
    s.parse()
}
