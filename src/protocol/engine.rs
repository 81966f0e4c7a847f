//! Protocol engine
//!
//! Turns one [`Observation`] per frame into a [`PhaseEvent`], advancing
//! through the six phases and eventually settling on a terminal
//! [`ResultStatus`].
//!
//! Evaluation order per frame:
//! 1. Terminal check (frames after the verdict are no-ops)
//! 2. Face-loss guardrail, active from phase 4 on
//! 3. The logic of the current phase
//!
//! The engine owns its state exclusively, never blocks, and never fails:
//! malformed observation fields are coerced to absence first.

use tracing::{debug, trace};

use crate::config::schema::{JawThresholds, ProtocolConfig, Thresholds};
use crate::error::ConfigError;
use crate::observation::Observation;

use super::event::{CountersSnapshot, PhaseEvent, PhaseTransition, Warning};
use super::phase::Phase;
use super::status::{FailureReason, ResultStatus};
use super::window::StabilityWindow;

// ============================================================================
// Settings
// ============================================================================

/// Thresholds and frame windows resolved from a [`ProtocolConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Confidence thresholds
    pub thresholds: Thresholds,
    /// Jaw thresholds
    pub jaw: JawThresholds,
    /// Phase 3 stability window
    pub pill_stationary_frames: u32,
    /// Phase 4 concealment window
    pub concealment_frames: u32,
    /// Phase 6 confirmation window
    pub final_confirmation_frames: u32,
    /// Face-loss grace window
    pub face_loss_grace_frames: u32,
    /// Frames at session start during which the face guardrail is inert
    pub face_guardrail_warmup_frames: u32,
    /// Nominal frame rate, used for duration estimates
    pub frame_rate: f64,
}

impl EngineSettings {
    /// Resolves window sizes against the configured frame rate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a window cannot be resolved.
    pub fn from_config(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        let rate = config.timing.frame_rate;
        let resolve = |field: &str, window: &crate::config::WindowSize| {
            window
                .to_frames(rate)
                .map_err(|message| ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: window.to_string(),
                    expected: message,
                })
        };
        let w = &config.windows;
        Ok(Self {
            thresholds: config.thresholds,
            jaw: config.jaw,
            pill_stationary_frames: resolve("windows.pill_stationary", &w.pill_stationary)?,
            concealment_frames: resolve("windows.concealment", &w.concealment)?,
            final_confirmation_frames: resolve(
                "windows.final_confirmation",
                &w.final_confirmation,
            )?,
            face_loss_grace_frames: resolve("windows.face_loss_grace", &w.face_loss_grace)?,
            face_guardrail_warmup_frames: resolve(
                "windows.face_guardrail_warmup",
                &w.face_guardrail_warmup,
            )?,
            frame_rate: rate,
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            jaw: JawThresholds::default(),
            pill_stationary_frames: 60,
            concealment_frames: 50,
            final_confirmation_frames: 60,
            face_loss_grace_frames: 60,
            face_guardrail_warmup_frames: 0,
            frame_rate: 30.0,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Text fields accumulated while a frame is evaluated.
struct FrameOutcome {
    status_text: String,
    message: String,
    warning: Option<Warning>,
    transition: Option<PhaseTransition>,
}

/// State machine for one verification session.
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    settings: EngineSettings,
    phase: Phase,
    status: ResultStatus,
    pill_window: StabilityWindow,
    phase4_counter: u32,
    final_confirm_counter: u32,
    face_loss_counter: u32,
    frame_count: u64,
    last_jaw_distance: f32,
}

impl ProtocolEngine {
    /// Creates an engine at phase 1.
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            pill_window: StabilityWindow::new(settings.pill_stationary_frames as usize),
            settings,
            phase: Phase::ShowPill,
            status: ResultStatus::Running,
            phase4_counter: 0,
            final_confirm_counter: 0,
            face_loss_counter: 0,
            frame_count: 0,
            last_jaw_distance: 0.0,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ResultStatus {
        self.status
    }

    /// `true` once a terminal status has been recorded.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Frames processed while the session was running.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CountersSnapshot {
        CountersSnapshot {
            frame_count: self.frame_count,
            pill_window: self.pill_window.len(),
            pill_window_target: self.settings.pill_stationary_frames,
            pill_centroid: self.pill_window.last_centroid(),
            phase4_counter: self.phase4_counter,
            concealment_target: self.settings.concealment_frames,
            final_confirm_counter: self.final_confirm_counter,
            final_confirmation_target: self.settings.final_confirmation_frames,
            face_loss_counter: self.face_loss_counter,
            face_loss_grace: self.settings.face_loss_grace_frames,
        }
    }

    /// Applies an explicit stop request.
    ///
    /// A running session becomes `USER_QUIT`; a finished one keeps its
    /// status. Returns the status after the call.
    pub fn stop(&mut self) -> ResultStatus {
        self.finish(ResultStatus::UserQuit);
        self.status
    }

    /// Terminates a running session with a fatal failure.
    ///
    /// Returns the status after the call.
    pub fn abort(&mut self, reason: FailureReason) -> ResultStatus {
        self.finish(ResultStatus::FatalFailure(reason));
        self.status
    }

    /// Feeds one observation through the state machine.
    ///
    /// After a terminal status every call is a no-op that reports the
    /// recorded outcome.
    pub fn process_frame(&mut self, observation: &Observation) -> PhaseEvent {
        if self.status.is_terminal() {
            return self.terminal_event();
        }

        let obs = observation.sanitized();
        self.frame_count += 1;
        self.last_jaw_distance = obs.jaw_distance;

        let mut outcome = FrameOutcome {
            status_text: format!("Phase {}", self.phase),
            message: self.phase.prompt().to_string(),
            warning: None,
            transition: None,
        };

        trace!(
            frame = self.frame_count,
            phase = self.phase.number(),
            jaw = obs.jaw_distance,
            face = obs.face_present,
            "evaluating frame"
        );

        if self.face_guardrail_tripped(&obs) {
            outcome.status_text = "FAILED: Face lost".to_string();
            outcome.message = "Face or mouth was hidden from the camera".to_string();
            return self.event(outcome);
        }

        match self.phase {
            Phase::ShowPill => self.show_pill(&obs, &mut outcome),
            Phase::OpenMouth => self.open_mouth(&obs, &mut outcome),
            Phase::PlaceOnTongue => self.place_on_tongue(&obs, &mut outcome),
            Phase::CloseMouth => self.close_mouth(&obs, &mut outcome),
            Phase::Reopen => self.reopen(&obs, &mut outcome),
            Phase::SwallowCheck => self.swallow_check(&obs, &mut outcome),
        }

        self.event(outcome)
    }

    // ========================================================================
    // Guardrail
    // ========================================================================

    /// Counts face-absent frames from phase 4 on. Returns `true` when the
    /// grace window is exhausted and the session has failed.
    fn face_guardrail_tripped(&mut self, obs: &Observation) -> bool {
        if self.phase < Phase::CloseMouth
            || self.frame_count <= u64::from(self.settings.face_guardrail_warmup_frames)
        {
            return false;
        }
        if obs.face_present {
            self.face_loss_counter = 0;
            return false;
        }
        self.face_loss_counter = self.face_loss_counter.saturating_add(1);
        if self.face_loss_counter >= self.settings.face_loss_grace_frames {
            debug!(
                phase = self.phase.number(),
                frames = self.face_loss_counter,
                "face lost for the whole grace window"
            );
            self.finish(ResultStatus::FatalFailure(FailureReason::MouthCovered));
            return true;
        }
        false
    }

    // ========================================================================
    // Phases
    // ========================================================================

    fn show_pill(&mut self, obs: &Observation, out: &mut FrameOutcome) {
        let t = &self.settings.thresholds;
        if obs.pill.is_at_least(t.pill_p1_min) {
            out.status_text = "SUCCESS: Pill detected".to_string();
            self.advance(out);
            return;
        }
        let mut feedback = format!(
            "Pill not detected (conf {:.2}, need {:.2})",
            obs.pill.confidence, t.pill_p1_min
        );
        if obs.hand.is_at_least(t.hand_min) {
            feedback.push_str(" - hand visible, hold the pill up to the camera");
        }
        out.message = format!("{}. {feedback}", self.phase.prompt());
    }

    fn open_mouth(&mut self, obs: &Observation, out: &mut FrameOutcome) {
        let tongue = obs.tongue_no_pill.is_at_least(self.settings.thresholds.tongue_min);
        let jaw_open = obs.jaw_distance > self.settings.jaw.mouth_open_threshold;
        if tongue && jaw_open {
            out.status_text = "SUCCESS: Mouth wide open".to_string();
            self.advance(out);
            return;
        }
        out.message = format!(
            "Open mouth WIDER! (Drop: {:.1}px, need >{:.1}px)",
            obs.jaw_distance, self.settings.jaw.mouth_open_threshold
        );
    }

    fn place_on_tongue(&mut self, obs: &Observation, out: &mut FrameOutcome) {
        let target = self.settings.pill_stationary_frames;
        if !obs.pill_on_tongue.is_at_least(self.settings.thresholds.pill_p3_min) {
            self.pill_window.clear();
            out.message = format!(
                "Place pill on tongue! (conf {:.2}, need {:.2})",
                obs.pill_on_tongue.confidence, self.settings.thresholds.pill_p3_min
            );
            return;
        }

        let Some(centroid) = obs.pill_on_tongue.centroid() else {
            self.pill_window.clear();
            out.message = "Pill not localized, keep it in view on your tongue".to_string();
            return;
        };

        let held = self.pill_window.push(centroid);
        if self.pill_window.is_full() {
            self.pill_window.clear();
            out.status_text = "SUCCESS: Pill stable".to_string();
            self.advance(out);
        } else {
            out.status_text = format!("HOLD: {held}/{target}");
            out.message = "Keep the pill steady on your tongue".to_string();
        }
    }

    fn close_mouth(&mut self, obs: &Observation, out: &mut FrameOutcome) {
        let t = &self.settings.thresholds;
        let jaw = &self.settings.jaw;

        if self.phase4_counter > 0
            && obs.jaw_distance > jaw.mouth_open_threshold
            && obs.pill_on_tongue.is_below(t.pill_p3_min)
        {
            debug!(
                jaw = obs.jaw_distance,
                pill_on_tongue = obs.pill_on_tongue.confidence,
                lost = self.phase4_counter,
                "mouth reopened with no pill visible; resetting closure count"
            );
            self.phase4_counter = 0;
            out.warning = Some(Warning::MedicationMissing);
        }

        let tongue_hidden = obs.tongue_no_pill.is_below(t.tongue_p4_max);
        let jaw_closed = obs.jaw_distance < jaw.mouth_closure_threshold;
        if tongue_hidden && jaw_closed {
            self.phase4_counter = self.phase4_counter.saturating_add(1);
            if self.phase4_counter >= self.settings.concealment_frames {
                self.phase4_counter = 0;
                out.status_text = "SUCCESS: Mouth closed".to_string();
                self.advance(out);
            } else {
                out.status_text = format!(
                    "HOLD CLOSE: {}/{}",
                    self.phase4_counter, self.settings.concealment_frames
                );
            }
            return;
        }

        if self.phase4_counter > 0 {
            self.phase4_counter = 0;
            out.warning.get_or_insert(Warning::MouthOpenedEarly);
        }
        let mut issues = Vec::new();
        if !tongue_hidden {
            issues.push("tongue still visible".to_string());
        }
        if !jaw_closed {
            issues.push(format!("jaw not fully closed ({:.1}px)", obs.jaw_distance));
        }
        out.message = format!("Please close your mouth completely! ({})", issues.join(", "));
        if let Some(warning) = out.warning {
            out.status_text = warning.message().to_string();
        }
    }

    fn reopen(&mut self, obs: &Observation, out: &mut FrameOutcome) {
        let t = &self.settings.thresholds;
        if obs.pill_on_tongue.is_at_least(t.pill_p3_min) {
            debug!(
                pill_on_tongue = obs.pill_on_tongue.confidence,
                "pill visible on tongue after concealment"
            );
            self.finish(ResultStatus::FatalFailure(FailureReason::PillReappeared));
            out.status_text = "FAILED: Pill reappeared".to_string();
            out.message = "Pill was still in the mouth after closing".to_string();
            return;
        }
        if obs.tongue_no_pill.is_at_least(t.tongue_min) {
            out.status_text = "SUCCESS: Re-opened mouth".to_string();
            self.advance(out);
            return;
        }
        out.message = "Open mouth wide again and show your tongue".to_string();
    }

    fn swallow_check(&mut self, obs: &Observation, out: &mut FrameOutcome) {
        let t = &self.settings.thresholds;
        let target = self.settings.final_confirmation_frames;
        let tongue = obs.tongue_no_pill.is_at_least(t.tongue_min);
        let pill_gone = obs.pill.is_below(t.pill_p6_max);

        if !(tongue && pill_gone) {
            self.final_confirm_counter = 0;
            out.status_text = "FAILURE: Pill still visible!".to_string();
            let mut issues = Vec::new();
            if !tongue {
                issues.push("mouth must be open");
            }
            if !pill_gone {
                issues.push("pill is still detected, swallow now");
            }
            out.message = format!("{} ({})", self.phase.prompt(), issues.join(", "));
            return;
        }

        self.final_confirm_counter = self.final_confirm_counter.saturating_add(1);
        if self.final_confirm_counter >= target {
            self.finish(ResultStatus::VerifiedPass);
            out.status_text = "VERIFIED (PASS)".to_string();
            out.message = "Medication intake verified".to_string();
        } else {
            out.status_text = format!(
                "FINAL CHECK: {} frames",
                target - self.final_confirm_counter
            );
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn advance(&mut self, out: &mut FrameOutcome) {
        let Some(next) = self.phase.next() else {
            return;
        };
        debug!(
            from = self.phase.number(),
            to = next.number(),
            frame = self.frame_count,
            "phase advanced"
        );
        out.transition = Some(PhaseTransition {
            from_phase: self.phase,
            to_phase: next,
        });
        out.message = next.prompt().to_string();
        self.phase = next;
    }

    /// Records a terminal status if none is recorded yet.
    fn finish(&mut self, status: ResultStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    fn event(&self, out: FrameOutcome) -> PhaseEvent {
        PhaseEvent {
            phase: self.phase,
            result_status: self.status,
            status_text: out.status_text,
            message: out.message,
            warning: out.warning,
            transition: out.transition,
            jaw_distance: self.last_jaw_distance,
            counters: self.counters(),
        }
    }

    fn terminal_event(&self) -> PhaseEvent {
        PhaseEvent {
            phase: self.phase,
            result_status: self.status,
            status_text: format!("Session finished: {}", self.status),
            message: String::new(),
            warning: None,
            transition: None,
            jaw_distance: self.last_jaw_distance,
            counters: self.counters(),
        }
    }
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
