//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size limit and UTF-8 BOM strip
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing
//! 4. Unknown-key detection (warnings, with suggestions)
//! 5. Deserialization to typed config
//! 6. Validation
//! 7. Freeze with `Arc`

use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::Arc;

use serde_yaml::Value;

use crate::config::schema::{ProtocolConfig, ROOT_KEYS, section_keys};
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,
}

/// Limits guarding the loader against oversized input.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("DOSEWATCH_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<ProtocolConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a configuration file and returns the frozen configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or exceeds the size
    /// limit, an environment reference is unresolvable, YAML parsing or
    /// deserialization fails, or validation reports errors.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.config_limits.max_config_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > limit {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {limit} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Loads configuration from YAML text; `source` is used in messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus file access.
    pub fn load_str(&self, raw: &str, source: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        if raw.len() > self.options.config_limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{} bytes", raw.len()),
                expected: format!(
                    "at most {} bytes",
                    self.options.config_limits.max_config_size
                ),
            });
        }

        let mut env_sub = EnvSubstitution::new(source);
        let substituted = env_sub.substitute(raw)?;
        warnings.extend(env_sub.warnings);

        let root: Value = serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
            path: source.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        // An empty document means "all defaults"
        let root = if root.is_null() {
            Value::Mapping(serde_yaml::Mapping::new())
        } else {
            root
        };

        warnings.extend(unknown_key_warnings(&root));

        let config: ProtocolConfig =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: source.to_path_buf(),
                line: None,
                message: format!("Failed to deserialize configuration: {e}"),
            })?;

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: source.display().to_string(),
                errors: result.errors,
            });
        }

        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Unknown keys
// ============================================================================

fn unknown_key_warnings(root: &Value) -> Vec<LoadWarning> {
    let mut warnings = Vec::new();
    let Some(mapping) = root.as_mapping() else {
        return warnings;
    };

    for (key, value) in mapping {
        let Some(key) = key.as_str() else { continue };
        let Some(allowed) = section_keys(key) else {
            warnings.push(unknown_key(key, ROOT_KEYS, "<root>"));
            continue;
        };
        if let Some(section) = value.as_mapping() {
            for inner in section.keys().filter_map(Value::as_str) {
                if !allowed.contains(&inner) {
                    warnings.push(unknown_key(inner, allowed, key));
                }
            }
        }
    }
    warnings
}

fn unknown_key(key: &str, allowed: &[&str], location: &str) -> LoadWarning {
    let message = suggest_key(key, allowed).map_or_else(
        || format!("unknown key '{key}' is ignored"),
        |s| format!("unknown key '{key}' is ignored (did you mean '{s}'?)"),
    );
    LoadWarning {
        message,
        location: Some(location.to_string()),
    }
}

/// Suggests the closest allowed key within a Damerau-Levenshtein distance of 3.
#[must_use]
pub fn suggest_key<'a>(input: &str, allowed: &[&'a str]) -> Option<&'a str> {
    allowed
        .iter()
        .map(|k| (*k, strsim::damerau_levenshtein(input, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(k, _)| k)
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text BEFORE parsing so substituted numbers keep their
/// YAML type.
struct EnvSubstitution {
    source: PathBuf,
    warnings: Vec<LoadWarning>,
}

/// A parsed `${...}` reference.
struct VarSpec {
    name: String,
    fallback: Fallback,
}

enum Fallback {
    /// `${VAR}`: empty string plus a warning
    Empty,
    /// `${VAR:-default}`
    Default(String),
    /// `${VAR:?message}`
    Required(String),
}

impl EnvSubstitution {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            warnings: Vec::new(),
        }
    }

    /// Supports `${VAR}`, `${VAR:-default}`, `${VAR:?message}` and `$$`.
    fn substitute(&mut self, raw: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                Some('{') => {
                    chars.next();
                    let spec = self.parse_spec(&mut chars)?;
                    out.push_str(&self.resolve(spec)?);
                }
                _ => out.push('$'),
            }
        }
        Ok(out)
    }

    fn resolve(&mut self, spec: VarSpec) -> Result<String, ConfigError> {
        if let Ok(value) = std::env::var(&spec.name) {
            return Ok(value);
        }
        match spec.fallback {
            Fallback::Default(value) => Ok(value),
            Fallback::Required(message) => Err(ConfigError::EnvVarNotSet {
                var: spec.name,
                message,
            }),
            Fallback::Empty => {
                self.warnings.push(LoadWarning {
                    message: format!(
                        "Environment variable '{}' is not set, using empty string",
                        spec.name
                    ),
                    location: Some(self.source.display().to_string()),
                });
                Ok(String::new())
            }
        }
    }

    fn parse_spec(&self, chars: &mut Peekable<Chars<'_>>) -> Result<VarSpec, ConfigError> {
        let mut name = String::new();
        while let Some(c) = chars.next() {
            match c {
                '}' => {
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Empty,
                    });
                }
                ':' if chars.peek() == Some(&'-') => {
                    chars.next();
                    let value = self.read_until_close(chars)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Default(value),
                    });
                }
                ':' if chars.peek() == Some(&'?') => {
                    chars.next();
                    let message = self.read_until_close(chars)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Required(message),
                    });
                }
                _ => name.push(c),
            }
        }
        Err(self.unclosed(&name))
    }

    /// Reads up to the matching `}`, allowing nested braces.
    fn read_until_close(&self, chars: &mut Peekable<Chars<'_>>) -> Result<String, ConfigError> {
        let mut value = String::new();
        let mut depth = 1usize;
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(value);
                    }
                }
                _ => {}
            }
            value.push(c);
        }
        Err(self.unclosed(&value))
    }

    fn unclosed(&self, fragment: &str) -> ConfigError {
        ConfigError::ParseError {
            path: self.source.clone(),
            line: None,
            message: format!("Unclosed environment variable reference: ${{{fragment}"),
        }
    }
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
