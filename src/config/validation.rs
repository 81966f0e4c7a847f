//! Configuration validation
//!
//! Runs on the fully deserialized `ProtocolConfig`. Validation collects ALL
//! issues rather than stopping at the first one.

use crate::config::schema::{ProtocolConfig, WindowSize};
use crate::error::{Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &ProtocolConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_thresholds(config);
        self.validate_jaw(config);
        self.validate_timing(config);
        self.validate_windows(config);
        self.validate_session(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_thresholds(&mut self, config: &ProtocolConfig) {
        let t = &config.thresholds;
        let fields = [
            ("thresholds.pill_p1_min", t.pill_p1_min),
            ("thresholds.pill_p3_min", t.pill_p3_min),
            ("thresholds.tongue_min", t.tongue_min),
            ("thresholds.tongue_p4_max", t.tongue_p4_max),
            ("thresholds.pill_p6_max", t.pill_p6_max),
            ("thresholds.hand_min", t.hand_min),
            ("detection.min_confidence", config.detection.min_confidence),
        ];
        for (path, value) in fields {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                self.add_error(path, &format!("confidence must be within [0, 1], got {value}"));
            }
        }

        if t.pill_p6_max > t.pill_p1_min {
            self.add_warning(
                "thresholds.pill_p6_max",
                "swallow check tolerates a pill more confident than the phase 1 bar",
            );
        }
        if t.tongue_p4_max >= t.tongue_min {
            self.add_warning(
                "thresholds.tongue_p4_max",
                "closed-mouth ceiling is not below the tongue detection bar",
            );
        }
    }

    fn validate_jaw(&mut self, config: &ProtocolConfig) {
        let jaw = &config.jaw;
        let mut finite = true;
        for (path, value) in [
            ("jaw.mouth_open_threshold", jaw.mouth_open_threshold),
            ("jaw.mouth_closure_threshold", jaw.mouth_closure_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                self.add_error(path, &format!("must be a non-negative number, got {value}"));
                finite = false;
            }
        }
        if finite && jaw.mouth_closure_threshold >= jaw.mouth_open_threshold {
            self.add_error(
                "jaw.mouth_closure_threshold",
                "closure threshold must be below the open threshold",
            );
        }
    }

    fn validate_timing(&mut self, config: &ProtocolConfig) {
        let rate = config.timing.frame_rate;
        if !rate.is_finite() || rate <= 0.0 {
            self.add_error(
                "timing.frame_rate",
                &format!("frame rate must be positive, got {rate}"),
            );
        }
    }

    fn validate_windows(&mut self, config: &ProtocolConfig) {
        let w = &config.windows;
        let rate = config.timing.frame_rate;
        let required = [
            ("windows.pill_stationary", &w.pill_stationary),
            ("windows.concealment", &w.concealment),
            ("windows.final_confirmation", &w.final_confirmation),
            ("windows.face_loss_grace", &w.face_loss_grace),
        ];
        for (path, window) in required {
            self.check_window(path, window, rate, 1);
        }
        self.check_window("windows.face_guardrail_warmup", &w.face_guardrail_warmup, rate, 0);
    }

    fn check_window(&mut self, path: &str, window: &WindowSize, rate: f64, min: u32) {
        // Duration windows are only checked against a usable frame rate;
        // a bad rate is reported once by `validate_timing`.
        if matches!(window, WindowSize::Duration(_)) && !(rate.is_finite() && rate > 0.0) {
            return;
        }
        match window.to_frames(rate) {
            Ok(frames) if frames < min => {
                self.add_error(path, &format!("must be at least {min} frame(s), got {frames}"));
            }
            Ok(_) => {}
            Err(message) => self.add_error(path, &message),
        }
    }

    fn validate_session(&mut self, config: &ProtocolConfig) {
        match config.session.idle_timeout() {
            Ok(d) if d.is_zero() => {
                self.add_error("session.idle_timeout", "idle timeout must be positive");
            }
            Ok(_) => {}
            Err(message) => self.add_error("session.idle_timeout", &message),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
