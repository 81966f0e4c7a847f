//! Error types for `DoseWatch`
//!
//! The protocol engine and the detection adapters never fail: they degrade
//! instead. Everything that can fail (configuration, session control, audit
//! persistence) is collected in this hierarchy.

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::ResultStatus;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `dosewatch` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Session control error (unknown or terminated session)
    pub const SESSION_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `dosewatch` operations.
#[derive(Debug, Error)]
pub enum DoseWatchError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session control error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Audit sink error
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// Stopped by Ctrl+C before every session finished
    #[error("interrupted")]
    Interrupted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DoseWatchError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Session(_) => ExitCode::SESSION_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Interrupted => ExitCode::INTERRUPTED,
            Self::Io(_) | Self::Sink(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({message})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message supplied with the `${VAR:?message}` reference
        message: String,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g. `"windows.concealment"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Session Errors
// ============================================================================

/// Rejected session-control operations.
///
/// These are operator errors: the manager reports them to the caller and
/// keeps running.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live or retired session has this id
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The session already reached a terminal status
    #[error("session {id} already finished with status {status}")]
    SessionTerminated {
        /// Session id
        id: String,
        /// The recorded terminal status
        status: ResultStatus,
    },

    /// A live session with this id already exists
    #[error("session {0} is already live")]
    DuplicateSession(String),

    /// Patient id was empty or blank
    #[error("patient id must not be empty")]
    InvalidPatient,

    /// The retiring session's verdict could not be persisted
    #[error("verdict for session {id} was not persisted: {source}")]
    VerdictNotDurable {
        /// Session id whose verdict failed to persist
        id: String,
        /// Underlying sink failure
        #[source]
        source: SinkError,
    },
}

// ============================================================================
// Sink Errors
// ============================================================================

/// Audit persistence failures.
#[derive(Debug, Error)]
pub enum SinkError {
    /// I/O error writing the audit trail
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The sink lock was poisoned by a panicking writer
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Detector Errors
// ============================================================================

/// Failures reported by object detectors and landmark trackers.
///
/// Adapters swallow these and degrade to an empty observation.
#[derive(Debug, Clone, Error)]
pub enum DetectorError {
    /// Model inference failed
    #[error("inference failed: {0}")]
    Inference(String),

    /// Model is not loaded
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FailureReason;

    #[test]
    fn exit_codes_map_per_category() {
        let config = DoseWatchError::Config(ConfigError::MissingFile {
            path: PathBuf::from("x.yaml"),
        });
        assert_eq!(config.exit_code(), ExitCode::CONFIG_ERROR);

        let session = DoseWatchError::Session(SessionError::UnknownSession("s-1".into()));
        assert_eq!(session.exit_code(), ExitCode::SESSION_ERROR);

        let usage = DoseWatchError::Usage("no frames".into());
        assert_eq!(usage.exit_code(), ExitCode::USAGE_ERROR);

        let io = DoseWatchError::Io(std::io::Error::other("disk"));
        assert_eq!(io.exit_code(), ExitCode::IO_ERROR);

        assert_eq!(
            DoseWatchError::Interrupted.exit_code(),
            ExitCode::INTERRUPTED
        );
    }

    #[test]
    fn validation_error_lists_issues() {
        let err = ConfigError::ValidationError {
            path: "cfg.yaml".into(),
            errors: vec![ValidationIssue {
                path: "windows.concealment".into(),
                message: "must be at least 1 frame".into(),
                severity: Severity::Error,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("cfg.yaml"));
        assert!(text.contains("error: must be at least 1 frame at windows.concealment"));
    }

    #[test]
    fn terminated_error_names_status() {
        let err = SessionError::SessionTerminated {
            id: "s-9".into(),
            status: ResultStatus::FatalFailure(FailureReason::PillReappeared),
        };
        assert_eq!(
            err.to_string(),
            "session s-9 already finished with status FATAL_FAILURE(pill_reappeared)"
        );
    }
}
