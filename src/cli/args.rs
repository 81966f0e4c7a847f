//! CLI argument definitions
//!
//! All Clap derive structs for `dosewatch` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Medication-ingestion verification engine.
#[derive(Parser, Debug)]
#[command(name = "dosewatch", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "DOSEWATCH_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "DOSEWATCH_LOG_FORMAT")]
    pub log_format: LogFormatArg,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay recorded frame files, one session per file.
    Run(RunArgs),

    /// Drive one session with scripted observations.
    Demo(DemoArgs),

    /// Validate configuration files.
    Validate(ValidateArgs),

    /// Print the default configuration as YAML.
    Defaults,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Recorded frame files (one JSON raw frame per line).
    #[arg(required = true)]
    pub frames: Vec<PathBuf>,

    /// Path to YAML configuration file.
    #[arg(short, long, env = "DOSEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Patient id used for every session.
    #[arg(short, long, default_value = "anonymous")]
    pub patient: String,

    /// Write structured events (JSONL) to this file, or `-` for stderr.
    #[arg(long, env = "DOSEWATCH_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Append audit records (JSONL) to this file.
    #[arg(long, env = "DOSEWATCH_AUDIT_FILE")]
    pub audit_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "DOSEWATCH_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `demo`.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "DOSEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Patient id for the demo session.
    #[arg(short, long, default_value = "demo")]
    pub patient: String,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Log format choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines.
    #[default]
    Human,
    /// JSON lines.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Human => Self::Human,
            LogFormatArg::Json => Self::Json,
        }
    }
}
