//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod defaults;
pub mod demo;
pub mod run;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::config::ProtocolConfig;
use crate::config::loader::ConfigLoader;
use crate::error::DoseWatchError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), DoseWatchError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Demo(args) => demo::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Defaults => defaults::run(),
    }
}

/// Loads `path`, or the built-in defaults when no path is given.
///
/// Loader warnings are logged.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Arc<ProtocolConfig>, DoseWatchError> {
    let Some(path) = path else {
        tracing::debug!("no configuration given, using defaults");
        return Ok(Arc::new(ProtocolConfig::default()));
    };

    tracing::info!(config = %path.display(), "loading configuration");
    let result = ConfigLoader::with_defaults().load(path)?;
    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(result.config)
}
