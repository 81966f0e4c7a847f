mod common;

use std::sync::Arc;

use common::{mouth_closed, mouth_open, pill_on_tongue, pill_shown};
use dosewatch::config::{ProtocolConfig, Windows};
use dosewatch::error::SessionError;
use dosewatch::observation::{DetectionClass, Observation};
use dosewatch::protocol::{FailureReason, Phase, ResultStatus};
use dosewatch::session::{MemorySink, SessionId, SessionManager};

const WINDOW: u32 = 3;

fn config() -> ProtocolConfig {
    ProtocolConfig {
        windows: Windows {
            pill_stationary: WINDOW.into(),
            concealment: WINDOW.into(),
            final_confirmation: WINDOW.into(),
            ..Windows::default()
        },
        ..ProtocolConfig::default()
    }
}

fn manager() -> (Arc<SessionManager>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let manager = SessionManager::new(&config(), Arc::clone(&sink) as _).unwrap();
    (Arc::new(manager), sink)
}

/// Frames for one session; `honest` decides whether the pill is still on
/// the tongue when the mouth reopens.
fn script(honest: bool) -> Vec<Observation> {
    let reopen = if honest {
        mouth_open()
    } else {
        mouth_open().with_confidence(DetectionClass::PillOnTongue, 0.9)
    };
    let mut frames = vec![pill_shown(), mouth_open()];
    frames.extend(std::iter::repeat_n(pill_on_tongue(), WINDOW as usize));
    frames.extend(std::iter::repeat_n(mouth_closed(), WINDOW as usize));
    frames.push(reopen);
    frames.extend(std::iter::repeat_n(mouth_open(), WINDOW as usize));
    frames
}

fn drive(manager: &SessionManager, id: SessionId, frames: &[Observation]) {
    for obs in frames {
        if manager.process_frame(id, obs).unwrap().is_terminal() {
            break;
        }
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_are_isolated() {
    let (manager, sink) = manager();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let honest = i % 2 == 0;
                let id = manager.start_session(&format!("patient-{i}")).unwrap();
                for obs in script(honest) {
                    let event = manager.process_frame(id, &obs).unwrap();
                    tokio::task::yield_now().await;
                    if event.is_terminal() {
                        break;
                    }
                }
                (honest, manager.verdict(id).unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (honest, verdict) = handle.await.unwrap();
        let expected = if honest {
            ResultStatus::VerifiedPass
        } else {
            ResultStatus::FatalFailure(FailureReason::PillReappeared)
        };
        assert_eq!(verdict.final_status, expected, "{}", verdict.patient_id);
    }

    assert_eq!(manager.live_count(), 0);
    assert_eq!(sink.records().len(), 16);
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn reset_starts_over_and_keeps_prior_verdict() {
    let (manager, sink) = manager();
    let first = manager.start_session("p-1").unwrap();
    drive(&manager, first, &script(true)[..4]);
    assert_eq!(manager.phase(first), Some(Phase::PlaceOnTongue));

    let second = manager.reset_session(first).unwrap();
    assert_ne!(first, second);
    assert_eq!(manager.phase(second), Some(Phase::ShowPill));

    let prior = manager.verdict(first).unwrap();
    assert_eq!(prior.final_status, ResultStatus::UserQuit);
    assert_eq!(prior.final_phase, Phase::PlaceOnTongue);
    assert_eq!(prior.patient_id, "p-1");

    drive(&manager, second, &script(true));
    assert_eq!(manager.verdict(first).unwrap(), prior);
    assert_eq!(
        manager.verdict(second).unwrap().final_status,
        ResultStatus::VerifiedPass
    );
    assert_eq!(sink.records().len(), 2);
}

// ============================================================================
// Rejected operations
// ============================================================================

#[test]
fn frames_after_verdict_are_rejected() {
    let (manager, _) = manager();
    let id = manager.start_session("p-3").unwrap();
    drive(&manager, id, &script(true));

    let err = manager.process_frame(id, &mouth_open()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::SessionTerminated {
            status: ResultStatus::VerifiedPass,
            ..
        }
    ));
}

#[test]
fn unknown_and_duplicate_ids_are_rejected() {
    let (manager, _) = manager();
    let stranger = SessionId::new();
    assert!(matches!(
        manager.process_frame(stranger, &mouth_open()),
        Err(SessionError::UnknownSession(_))
    ));
    assert!(matches!(
        manager.stop_session(stranger),
        Err(SessionError::UnknownSession(_))
    ));

    let id = manager.start_session_with_id(stranger, "p-4").unwrap();
    assert!(matches!(
        manager.start_session_with_id(id, "p-5"),
        Err(SessionError::DuplicateSession(_))
    ));
    manager.stop_session(id).unwrap();
    assert!(matches!(
        manager.start_session_with_id(id, "p-5"),
        Err(SessionError::DuplicateSession(_))
    ));
    assert!(matches!(
        manager.start_session("   "),
        Err(SessionError::InvalidPatient)
    ));
}
