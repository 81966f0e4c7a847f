//! Logging initialization for `DoseWatch`.
//!
//! Structured logging via `tracing` with human-readable and JSON output,
//! configurable verbosity, and an environment override via
//! `DOSEWATCH_LOG_LEVEL`.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "DOSEWATCH_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Crate whose events `-v` flags raise; dependencies stay quiet until `-vvv`.
const CRATE_TARGET: &str = "dosewatch";

/// Maps a verbosity level to the default filter directive.
///
/// | `-v` | dosewatch | dependencies |
/// |---|---|---|
/// | 0 | warn | warn |
/// | 1 | info | warn |
/// | 2 | debug | warn |
/// | 3 | trace | info |
/// | 4+ | trace | trace |
#[must_use]
pub fn default_directive(verbosity: u8) -> String {
    let (own, deps) = match verbosity {
        0 => return "warn".to_string(),
        1 => ("info", "warn"),
        2 => ("debug", "warn"),
        3 => ("trace", "info"),
        _ => return "trace".to_string(),
    };
    format!("{deps},{CRATE_TARGET}={own}")
}

/// Initializes the global tracing subscriber on stderr.
///
/// `DOSEWATCH_LOG_LEVEL`, when set, takes precedence over `verbosity`.
/// Uses `try_init()`, so repeated calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
