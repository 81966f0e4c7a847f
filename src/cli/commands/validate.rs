//! `validate` command handler.

use crate::cli::args::ValidateArgs;
use crate::config::loader::ConfigLoader;
use crate::error::{ConfigError, DoseWatchError, Severity, ValidationIssue};

/// Validates each configuration file.
///
/// Stops at the first invalid file. With `--strict`, loader warnings fail
/// validation too.
///
/// # Errors
///
/// Returns an I/O error if a file does not exist, or a config error if
/// validation fails.
pub fn run(args: &ValidateArgs) -> Result<(), DoseWatchError> {
    let loader = ConfigLoader::with_defaults();
    for path in &args.files {
        if !path.exists() {
            return Err(DoseWatchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
        tracing::info!(file = %path.display(), "validating configuration");

        let result = loader.load(path)?;
        for warning in &result.warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }

        if args.strict && !result.warnings.is_empty() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result
                    .warnings
                    .into_iter()
                    .map(|w| ValidationIssue {
                        path: w.location.unwrap_or_default(),
                        message: w.message,
                        severity: Severity::Warning,
                    })
                    .collect(),
            }
            .into());
        }

        println!("{}: ok", path.display());
    }
    Ok(())
}
