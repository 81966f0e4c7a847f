//! Session manager
//!
//! Owns one [`ProtocolEngine`] per live session id and routes frames to it.
//!
//! - Frames for one session are serialized by a per-session mutex
//! - Sessions for different ids share nothing but the resolved settings
//! - A session that reaches a terminal status is retired immediately: its
//!   verdict is stored, handed to the sink, and the engine is dropped
//! - Operations on unknown or retired ids are rejected, logged and counted

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, error, info, warn};

use crate::config::{ProtocolConfig, Validator};
use crate::error::{ConfigError, SessionError, SinkError};
use crate::observability::events::{Event, EventEmitter, GuardrailKind};
use crate::observability::metrics;
use crate::observation::Observation;
use crate::protocol::{
    EngineSettings, FailureReason, Phase, PhaseEvent, ProtocolEngine, ResultStatus,
};

use super::SessionId;
use super::sink::VerdictSink;
use super::verdict::{AuditRecord, Verdict, duration_estimate_secs};

// ============================================================================
// Session
// ============================================================================

/// One patient's live run through the protocol.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    patient_id: String,
    engine: ProtocolEngine,
    started_at: DateTime<Utc>,
    last_activity: Instant,
}

impl Session {
    fn new(id: SessionId, patient_id: String, settings: EngineSettings) -> Self {
        Self {
            id,
            patient_id,
            engine: ProtocolEngine::new(settings),
            started_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Patient id.
    #[must_use]
    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// The session's engine.
    #[must_use]
    pub const fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// Wall-clock start.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn verdict(&self, frame_rate: f64) -> Verdict {
        Verdict {
            session_id: self.id,
            patient_id: self.patient_id.clone(),
            final_status: self.engine.status(),
            final_phase: self.engine.phase(),
            frame_count: self.engine.frame_count(),
            duration_estimate_secs: duration_estimate_secs(self.engine.frame_count(), frame_rate),
            started_at: self.started_at,
            ended_at: Utc::now(),
        }
    }
}

type SessionHandle = Arc<Mutex<Session>>;

fn lock(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    // a poisoned lock still guards a valid engine
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Manager
// ============================================================================

/// Registry of live sessions.
pub struct SessionManager {
    settings: EngineSettings,
    idle_timeout: Duration,
    live: DashMap<SessionId, SessionHandle>,
    verdicts: DashMap<SessionId, Verdict>,
    undelivered: DashMap<SessionId, AuditRecord>,
    sink: Arc<dyn VerdictSink>,
    events: Option<Arc<EventEmitter>>,
    model_ids: Vec<String>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("live", &self.live.len())
            .field("retired", &self.verdicts.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager for `config`, persisting verdicts to `sink`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `config` fails validation,
    /// and `ConfigError::InvalidValue` if a window size or the idle timeout
    /// cannot be resolved.
    pub fn new(config: &ProtocolConfig, sink: Arc<dyn VerdictSink>) -> Result<Self, ConfigError> {
        let validation = Validator::new().validate(config);
        if validation.has_errors() {
            return Err(ConfigError::ValidationError {
                path: "<in-memory>".into(),
                errors: validation.errors,
            });
        }
        let settings = EngineSettings::from_config(config)?;
        let idle_timeout =
            config
                .session
                .idle_timeout()
                .map_err(|expected| ConfigError::InvalidValue {
                    field: "session.idle_timeout".into(),
                    value: config.session.idle_timeout.clone(),
                    expected,
                })?;
        Ok(Self {
            settings,
            idle_timeout,
            live: DashMap::new(),
            verdicts: DashMap::new(),
            undelivered: DashMap::new(),
            sink,
            events: None,
            model_ids: Vec::new(),
        })
    }

    /// Attaches a structured event stream.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = Some(events);
        self
    }

    /// Sets the model identifiers written to audit records.
    #[must_use]
    pub fn with_model_ids(mut self, model_ids: Vec<String>) -> Self {
        self.model_ids = model_ids;
        self
    }

    /// Resolved engine settings shared by every session.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Inactivity after which [`reap_idle`](Self::reap_idle) abandons a session.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Number of live sessions.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Verdict of a retired session.
    #[must_use]
    pub fn verdict(&self, id: SessionId) -> Option<Verdict> {
        self.verdicts.get(&id).map(|v| v.value().clone())
    }

    /// Removes and returns the verdict of a retired session.
    ///
    /// A verdict whose sink write is still pending stays held and `None` is
    /// returned. Once taken, the id is unknown to the manager.
    pub fn take_verdict(&self, id: SessionId) -> Option<Verdict> {
        if self.undelivered.contains_key(&id) {
            return None;
        }
        self.verdicts.remove(&id).map(|(_, v)| v)
    }

    /// Number of retired verdicts still held.
    #[must_use]
    pub fn retained_count(&self) -> usize {
        self.verdicts.len()
    }

    /// Current phase of a live session.
    #[must_use]
    pub fn phase(&self, id: SessionId) -> Option<Phase> {
        let handle = self.handle(id)?;
        let phase = lock(&handle).engine.phase();
        Some(phase)
    }

    /// Verdicts whose sink write failed and is still pending.
    #[must_use]
    pub fn undelivered_count(&self) -> usize {
        self.undelivered.len()
    }

    // ------------------------------------------------------------------------
    // Session control
    // ------------------------------------------------------------------------

    /// Starts a session at phase 1 under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPatient` for a blank patient id.
    pub fn start_session(&self, patient_id: &str) -> Result<SessionId, SessionError> {
        self.start_session_with_id(SessionId::new(), patient_id)
    }

    /// Starts a session at phase 1 under a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPatient` for a blank patient id and
    /// `SessionError::DuplicateSession` if the id is live or retired.
    pub fn start_session_with_id(
        &self,
        id: SessionId,
        patient_id: &str,
    ) -> Result<SessionId, SessionError> {
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(SessionError::InvalidPatient);
        }
        if self.verdicts.contains_key(&id) {
            return Err(self.reject(id, SessionError::DuplicateSession(id.to_string())));
        }
        match self.live.entry(id) {
            Entry::Occupied(_) => {
                return Err(self.reject(id, SessionError::DuplicateSession(id.to_string())));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(Session::new(
                    id,
                    patient_id.to_string(),
                    self.settings,
                ))));
            }
        }

        info!(session_id = %id, patient_id, "session started");
        metrics::set_sessions_active(self.live.len());
        self.emit(Event::SessionStarted {
            timestamp: Utc::now(),
            session_id: id.to_string(),
            patient_id: patient_id.to_string(),
        });
        Ok(id)
    }

    /// Feeds one observation to a live session.
    ///
    /// Frames for the same session are applied strictly one at a time.
    /// When the frame ends the session, it is retired before this returns.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSession` or
    /// `SessionError::SessionTerminated` when the id is not live.
    pub fn process_frame(
        &self,
        id: SessionId,
        observation: &Observation,
    ) -> Result<PhaseEvent, SessionError> {
        let Some(handle) = self.handle(id) else {
            return Err(self.reject(id, self.not_live(id)));
        };
        let mut session = lock(&handle);
        if session.engine.is_terminal() {
            // retired by a concurrent call between lookup and lock
            let status = session.engine.status();
            drop(session);
            return Err(self.reject(
                id,
                SessionError::SessionTerminated {
                    id: id.to_string(),
                    status,
                },
            ));
        }

        let event = session.engine.process_frame(observation);
        session.last_activity = Instant::now();
        metrics::record_frame();
        self.observe(&session, &event);

        if event.is_terminal() {
            // a failed write stays queued for retry; the verdict is still recorded
            let _ = self.retire(&session);
        }
        drop(session);
        Ok(event)
    }

    /// Stops a session.
    ///
    /// A running session ends as `USER_QUIT`. Stopping a retired session
    /// returns its recorded verdict unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSession` for an id never started, and
    /// `SessionError::VerdictNotDurable` if the verdict could not be
    /// persisted (it is still retrievable through [`verdict`](Self::verdict)).
    pub fn stop_session(&self, id: SessionId) -> Result<Verdict, SessionError> {
        self.end_session(id, |engine| engine.stop())
    }

    /// Retires a session and starts a fresh one for the same patient.
    ///
    /// The old session's verdict is persisted before the new session is
    /// created. A running session ends as `USER_QUIT`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSession` for an id never started, and
    /// `SessionError::VerdictNotDurable` if the old verdict could not be
    /// persisted, in which case no new session is started.
    pub fn reset_session(&self, id: SessionId) -> Result<SessionId, SessionError> {
        let verdict = self.end_session(id, |engine| engine.stop())?;
        debug!(session_id = %id, "retired session before reset");
        self.start_session(&verdict.patient_id)
    }

    /// Abandons sessions idle for at least the configured timeout.
    ///
    /// Each one ends as `FATAL_FAILURE(abandoned)`. Returns their verdicts.
    pub fn reap_idle(&self, now: Instant) -> Vec<Verdict> {
        let candidates: Vec<(SessionId, SessionHandle)> = self
            .live
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();

        let mut reaped = Vec::new();
        for (id, handle) in candidates {
            let mut session = lock(&handle);
            let idle = now.saturating_duration_since(session.last_activity);
            if session.engine.is_terminal() || idle < self.idle_timeout {
                continue;
            }
            warn!(
                session_id = %id,
                idle_secs = idle.as_secs(),
                phase = session.engine.phase().number(),
                "abandoning idle session"
            );
            session.engine.abort(FailureReason::Abandoned);
            let verdict = self.retire(&session).unwrap_or_else(|(v, _)| v);
            drop(session);
            reaped.push(verdict);
        }
        reaped
    }

    /// Stops every live session as `USER_QUIT`.
    pub fn stop_all(&self) -> Vec<Verdict> {
        let ids: Vec<SessionId> = self.live.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter_map(|id| match self.stop_session(id) {
                Ok(v) => Some(v),
                Err(SessionError::VerdictNotDurable { .. }) => self.verdict(id),
                Err(_) => None,
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn handle(&self, id: SessionId) -> Option<SessionHandle> {
        self.live.get(&id).map(|e| Arc::clone(e.value()))
    }

    fn not_live(&self, id: SessionId) -> SessionError {
        self.verdicts.get(&id).map_or_else(
            || SessionError::UnknownSession(id.to_string()),
            |v| SessionError::SessionTerminated {
                id: id.to_string(),
                status: v.final_status,
            },
        )
    }

    /// Ends a live session with `terminate`, or re-delivers the verdict of a
    /// retired one.
    fn end_session(
        &self,
        id: SessionId,
        terminate: impl FnOnce(&mut ProtocolEngine) -> ResultStatus,
    ) -> Result<Verdict, SessionError> {
        if let Some(handle) = self.handle(id) {
            let mut session = lock(&handle);
            if !session.engine.is_terminal() {
                terminate(&mut session.engine);
                let result = self.retire(&session);
                drop(session);
                return result.map_err(|(_, source)| SessionError::VerdictNotDurable {
                    id: id.to_string(),
                    source,
                });
            }
        }

        let Some(verdict) = self.verdict(id) else {
            return Err(self.reject(id, SessionError::UnknownSession(id.to_string())));
        };
        self.redeliver(id)
            .map_err(|source| SessionError::VerdictNotDurable {
                id: id.to_string(),
                source,
            })?;
        Ok(verdict)
    }

    /// Records the verdict of a terminal session, removes it from the live
    /// set and hands the audit record to the sink.
    ///
    /// Must be called with the session lock held.
    fn retire(&self, session: &Session) -> Result<Verdict, (Verdict, SinkError)> {
        let verdict = session.verdict(self.settings.frame_rate);
        let id = verdict.session_id;

        self.verdicts.insert(id, verdict.clone());
        self.live.remove(&id);

        match verdict.final_status {
            ResultStatus::VerifiedPass => info!(
                session_id = %id,
                patient_id = %verdict.patient_id,
                frames = verdict.frame_count,
                status = %verdict.final_status,
                "session verified"
            ),
            _ => warn!(
                session_id = %id,
                patient_id = %verdict.patient_id,
                phase = verdict.final_phase.number(),
                frames = verdict.frame_count,
                status = %verdict.final_status,
                "session ended without verification"
            ),
        }
        metrics::record_verdict(verdict.final_status);
        metrics::set_sessions_active(self.live.len());
        self.emit(Event::SessionEnded {
            timestamp: verdict.ended_at,
            session_id: id.to_string(),
            patient_id: verdict.patient_id.clone(),
            final_status: verdict.final_status,
            final_phase: verdict.final_phase,
            frame_count: verdict.frame_count,
        });

        let record = AuditRecord::from_verdict(&verdict, &self.model_ids);
        match self.sink.record(&record) {
            Ok(()) => Ok(verdict),
            Err(e) => {
                error!(session_id = %id, error = %e, "failed to persist verdict");
                self.undelivered.insert(id, record);
                Err((verdict, e))
            }
        }
    }

    /// Retries a pending sink write for a retired session.
    fn redeliver(&self, id: SessionId) -> Result<(), SinkError> {
        let Some(record) = self.undelivered.get(&id).map(|r| r.value().clone()) else {
            return Ok(());
        };
        self.sink.record(&record)?;
        self.undelivered.remove(&id);
        debug!(session_id = %id, "pending verdict persisted");
        Ok(())
    }

    /// Logs, counts and reports a rejected operation, returning the error.
    fn reject(&self, id: SessionId, err: SessionError) -> SessionError {
        let reason = match &err {
            SessionError::UnknownSession(_) => "unknown_session",
            SessionError::SessionTerminated { .. } => "session_terminated",
            SessionError::DuplicateSession(_) => "duplicate_session",
            SessionError::InvalidPatient => "invalid_patient",
            SessionError::VerdictNotDurable { .. } => "verdict_not_durable",
        };
        warn!(session_id = %id, reason, error = %err, "session operation rejected");
        metrics::record_rejected(reason);
        self.emit(Event::FrameRejected {
            timestamp: Utc::now(),
            session_id: id.to_string(),
            reason: err.to_string(),
        });
        err
    }

    /// Reports transitions and guardrails for a processed frame.
    fn observe(&self, session: &Session, event: &PhaseEvent) {
        let id = session.id;
        if let Some(t) = event.transition {
            info!(
                session_id = %id,
                from = t.from_phase.number(),
                to = t.to_phase.number(),
                frame = event.counters.frame_count,
                "phase advanced"
            );
            metrics::record_phase_transition(t.to_phase);
            self.emit(Event::PhaseAdvanced {
                timestamp: Utc::now(),
                session_id: id.to_string(),
                from_phase: t.from_phase,
                to_phase: t.to_phase,
                frame: event.counters.frame_count,
            });
        }

        let guardrail = match (event.warning, event.result_status) {
            (Some(w), _) => Some(GuardrailKind::from(w)),
            (None, ResultStatus::FatalFailure(FailureReason::MouthCovered)) => {
                Some(GuardrailKind::FaceLost)
            }
            (None, ResultStatus::FatalFailure(FailureReason::PillReappeared)) => {
                Some(GuardrailKind::PillReappeared)
            }
            _ => None,
        };
        if let Some(kind) = guardrail {
            warn!(
                session_id = %id,
                kind = kind.as_str(),
                phase = event.phase.number(),
                fatal = kind.is_fatal(),
                "guardrail triggered"
            );
            metrics::record_guardrail(kind.as_str());
            self.emit(Event::GuardrailTriggered {
                timestamp: Utc::now(),
                session_id: id.to_string(),
                kind,
                phase: event.phase,
                fatal: kind.is_fatal(),
            });
        }
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowSize;
    use crate::observation::{Detection, DetectionClass, Rect};
    use crate::session::MemorySink;

    fn config() -> ProtocolConfig {
        let mut config = ProtocolConfig::default();
        config.windows.pill_stationary = WindowSize::Frames(2);
        config.windows.concealment = WindowSize::Frames(2);
        config.windows.final_confirmation = WindowSize::Frames(2);
        config.windows.face_loss_grace = WindowSize::Frames(3);
        config.session.idle_timeout = "10s".into();
        config
    }

    fn manager() -> (SessionManager, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let manager = SessionManager::new(&config(), sink.clone()).unwrap();
        (manager, sink)
    }

    fn pill_up() -> Observation {
        Observation::absent()
            .with_face(true)
            .with_confidence(DetectionClass::Pill, 0.9)
    }

    #[test]
    fn start_rejects_blank_patient() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.start_session("  "),
            Err(SessionError::InvalidPatient)
        ));
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let (manager, _) = manager();
        let id = manager.start_session("p-1").unwrap();
        assert!(matches!(
            manager.start_session_with_id(id, "p-2"),
            Err(SessionError::DuplicateSession(_))
        ));
    }

    #[test]
    fn unknown_session_is_rejected() {
        let (manager, _) = manager();
        let err = manager
            .process_frame(SessionId::new(), &pill_up())
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownSession(_)));
    }

    #[test]
    fn stop_retires_and_persists() {
        let (manager, sink) = manager();
        let id = manager.start_session("p-1").unwrap();
        manager.process_frame(id, &pill_up()).unwrap();

        let verdict = manager.stop_session(id).unwrap();
        assert_eq!(verdict.final_status, ResultStatus::UserQuit);
        assert_eq!(verdict.final_phase, Phase::OpenMouth);
        assert_eq!(verdict.frame_count, 1);
        assert_eq!(manager.live_count(), 0);
        assert_eq!(sink.records().len(), 1);

        let err = manager.process_frame(id, &pill_up()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::SessionTerminated {
                status: ResultStatus::UserQuit,
                ..
            }
        ));
        // stopping again returns the same verdict without a second write
        assert_eq!(manager.stop_session(id).unwrap(), verdict);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn reset_starts_fresh_session_for_same_patient() {
        let (manager, _) = manager();
        let old = manager.start_session("p-1").unwrap();
        manager.process_frame(old, &pill_up()).unwrap();

        let new = manager.reset_session(old).unwrap();
        assert_ne!(old, new);
        assert_eq!(manager.phase(new), Some(Phase::ShowPill));
        assert_eq!(
            manager.verdict(old).map(|v| v.final_status),
            Some(ResultStatus::UserQuit)
        );
    }

    #[test]
    fn reset_waits_for_durable_verdict() {
        let (manager, sink) = manager();
        let old = manager.start_session("p-1").unwrap();
        sink.set_offline(true);

        let err = manager.reset_session(old).unwrap_err();
        assert!(matches!(err, SessionError::VerdictNotDurable { .. }));
        assert_eq!(manager.live_count(), 0);
        assert_eq!(manager.undelivered_count(), 1);

        sink.set_offline(false);
        let new = manager.reset_session(old).unwrap();
        assert_eq!(manager.undelivered_count(), 0);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(manager.phase(new), Some(Phase::ShowPill));
    }

    #[test]
    fn idle_sessions_are_abandoned() {
        let (manager, sink) = manager();
        let id = manager.start_session("p-1").unwrap();
        let other = manager.start_session("p-2").unwrap();

        assert!(manager.reap_idle(Instant::now()).is_empty());

        let later = Instant::now() + Duration::from_secs(11);
        let reaped = manager.reap_idle(later);
        assert_eq!(reaped.len(), 2);
        for v in &reaped {
            assert_eq!(
                v.final_status,
                ResultStatus::FatalFailure(FailureReason::Abandoned)
            );
        }
        assert!(manager.verdict(id).is_some());
        assert!(manager.verdict(other).is_some());
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn terminal_frame_retires_session() {
        let (manager, sink) = manager();
        let id = manager.start_session("p-1").unwrap();
        manager.process_frame(id, &pill_up()).unwrap();
        let open = Observation::absent()
            .with_face(true)
            .with_confidence(DetectionClass::TongueNoPill, 0.9)
            .with_jaw(30.0);
        manager.process_frame(id, &open).unwrap();
        let on_tongue = Observation::absent().with_face(true).with_detection(
            DetectionClass::PillOnTongue,
            Detection::with_bbox(0.9, Rect::new(100.0, 120.0, 10.0, 10.0)),
        );
        manager.process_frame(id, &on_tongue).unwrap();
        manager.process_frame(id, &on_tongue).unwrap();
        assert_eq!(manager.phase(id), Some(Phase::CloseMouth));

        let hidden = Observation::absent();
        manager.process_frame(id, &hidden).unwrap();
        manager.process_frame(id, &hidden).unwrap();
        let ev = manager.process_frame(id, &hidden).unwrap();
        assert_eq!(
            ev.result_status,
            ResultStatus::FatalFailure(FailureReason::MouthCovered)
        );
        assert_eq!(manager.live_count(), 0);
        assert_eq!(
            sink.records()[0].failure_reason,
            Some(FailureReason::MouthCovered)
        );
    }

    #[test]
    fn events_are_emitted() {
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(EventEmitter::noop());
        let manager = SessionManager::new(&config(), sink)
            .unwrap()
            .with_events(Arc::clone(&events));
        let id = manager.start_session("p-1").unwrap();
        manager.process_frame(id, &pill_up()).unwrap();
        manager.stop_session(id).unwrap();
        // started, advanced, ended
        assert_eq!(events.event_count(), 3);
    }

    #[test]
    fn bad_idle_timeout_is_config_error() {
        let mut config = config();
        config.session.idle_timeout = "whenever".into();
        let err = SessionManager::new(&config, Arc::new(MemorySink::new())).unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => {
                assert_eq!(errors[0].path, "session.idle_timeout");
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn empty_window_is_rejected_at_construction() {
        let mut config = config();
        config.windows.concealment = WindowSize::Frames(0);
        config.windows.face_loss_grace = WindowSize::Frames(0);
        let err = SessionManager::new(&config, Arc::new(MemorySink::new())).unwrap_err();
        let ConfigError::ValidationError { errors, .. } = err else {
            panic!("expected ValidationError, got {err:?}");
        };
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["windows.concealment", "windows.face_loss_grace"]);
    }

    #[test]
    fn nan_threshold_is_rejected_at_construction() {
        let mut config = config();
        config.thresholds.pill_p1_min = f32::NAN;
        assert!(matches!(
            SessionManager::new(&config, Arc::new(MemorySink::new())),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn taken_verdict_is_released() {
        let (manager, sink) = manager();
        let id = manager.start_session("p-1").unwrap();
        assert!(manager.take_verdict(id).is_none());

        let stopped = manager.stop_session(id).unwrap();
        assert_eq!(manager.retained_count(), 1);
        assert_eq!(manager.take_verdict(id), Some(stopped));
        assert_eq!(manager.retained_count(), 0);
        assert!(manager.take_verdict(id).is_none());
        assert!(matches!(
            manager.stop_session(id),
            Err(SessionError::UnknownSession(_))
        ));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn pending_verdict_is_not_taken() {
        let (manager, sink) = manager();
        let id = manager.start_session("p-1").unwrap();
        sink.set_offline(true);
        assert!(manager.stop_session(id).is_err());
        assert!(manager.take_verdict(id).is_none());
        assert_eq!(manager.retained_count(), 1);

        sink.set_offline(false);
        manager.stop_session(id).unwrap();
        assert!(manager.take_verdict(id).is_some());
    }

    #[test]
    fn stop_all_ends_every_live_session() {
        let (manager, sink) = manager();
        let a = manager.start_session("p-1").unwrap();
        let b = manager.start_session("p-2").unwrap();
        manager.process_frame(a, &pill_up()).unwrap();

        let mut stopped = manager.stop_all();
        stopped.sort_by_key(|v| v.frame_count);
        assert_eq!(stopped.len(), 2);
        assert_eq!(stopped[0].session_id, b);
        assert_eq!(stopped[1].session_id, a);
        assert!(stopped.iter().all(|v| v.final_status == ResultStatus::UserQuit));
        assert_eq!(manager.live_count(), 0);
        assert_eq!(sink.records().len(), 2);
        assert!(manager.stop_all().is_empty());
    }
}
