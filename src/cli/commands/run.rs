//! `run` command handler.
//!
//! Each recorded frame file becomes its own session, replayed on its own
//! tokio task. Sessions share the manager and nothing else. A background
//! task abandons sessions whose file stops producing frames.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::detection::{DetectionAdapter, RecordedAdapter};
use crate::error::{DoseWatchError, SessionError};
use crate::observability::events::EventEmitter;
use crate::session::{
    JsonlAuditSink, NoopSink, SessionId, SessionManager, Verdict, VerdictSink,
};

const MIN_REAP_PERIOD: Duration = Duration::from_millis(10);
const MAX_REAP_PERIOD: Duration = Duration::from_secs(30);

/// Replays every frame file and prints one verdict JSON line per file.
///
/// # Errors
///
/// Returns a usage error for a blank patient id, an I/O error if a frame
/// file is missing or unreadable, a config error for an invalid
/// configuration, or `Interrupted` when cancelled.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), DoseWatchError> {
    if args.patient.trim().is_empty() {
        return Err(DoseWatchError::Usage("--patient must not be empty".into()));
    }
    for path in &args.frames {
        if !path.exists() {
            return Err(DoseWatchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
    }

    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = super::load_config(args.config.as_deref())?;

    let sink: Arc<dyn VerdictSink> = match &args.audit_file {
        Some(path) => Arc::new(JsonlAuditSink::open(path)?),
        None => Arc::new(NoopSink),
    };
    let events = match &args.events_file {
        Some(path) if path.as_os_str() == "-" => EventEmitter::stderr(),
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };
    let events = Arc::new(events);

    let manager = Arc::new(
        SessionManager::new(&config, sink)?
            .with_events(Arc::clone(&events))
            .with_model_ids(vec!["recorded".to_string()]),
    );
    let min_confidence = config.detection.min_confidence;
    let reaper_stop = cancel.child_token();
    let reaper = spawn_reaper(Arc::clone(&manager), reaper_stop.clone());

    let handles: Vec<_> = args
        .frames
        .iter()
        .cloned()
        .map(|path| {
            let manager = Arc::clone(&manager);
            let cancel = cancel.clone();
            let patient = args.patient.clone();
            tokio::spawn(async move {
                replay(&manager, &path, &patient, min_confidence, &cancel).await
            })
        })
        .collect();

    let mut first_error = None;
    for (path, handle) in args.frames.iter().zip(handles) {
        let outcome = handle
            .await
            .map_err(|e| DoseWatchError::Io(std::io::Error::other(e.to_string())))
            .and_then(|r| r);
        match outcome {
            Ok(verdict) => {
                println!("{}", serde_json::to_string(&verdict)?);
                manager.take_verdict(verdict.session_id);
            }
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "replay failed");
                first_error.get_or_insert(e);
            }
        }
    }

    reaper_stop.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!(error = %e, "idle reaper did not shut down cleanly");
    }
    // a replay task that panicked leaves its session live
    let orphaned = manager.stop_all();
    if !orphaned.is_empty() {
        tracing::warn!(count = orphaned.len(), "stopped sessions left running");
    }
    events.flush();

    if let Some(e) = first_error {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(DoseWatchError::Interrupted);
    }
    Ok(())
}

/// Abandons idle sessions on a fixed period until `stop` is cancelled.
fn spawn_reaper(manager: Arc<SessionManager>, stop: CancellationToken) -> JoinHandle<()> {
    let period = (manager.idle_timeout() / 4).clamp(MIN_REAP_PERIOD, MAX_REAP_PERIOD);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let reaped = manager.reap_idle(Instant::now());
                    if !reaped.is_empty() {
                        tracing::debug!(count = reaped.len(), "idle sessions abandoned");
                    }
                }
            }
        }
    })
}

/// Replays one file as one session.
///
/// A file that ends, fails to read, or a run that is cancelled before the
/// session reaches a verdict stops the session as `USER_QUIT`. The session
/// always ends with a recorded verdict; a read error is returned after it.
async fn replay(
    manager: &SessionManager,
    path: &Path,
    patient: &str,
    min_confidence: f32,
    cancel: &CancellationToken,
) -> Result<Verdict, DoseWatchError> {
    let id = manager.start_session(patient)?;
    tracing::info!(session_id = %id, file = %path.display(), "replaying frames");

    let fed = feed(manager, id, path, min_confidence, cancel).await;
    let verdict = match manager.verdict(id) {
        Some(verdict) => verdict,
        None => manager.stop_session(id)?,
    };
    fed.map(|()| verdict)
}

/// Feeds every line of `path` to session `id` until it ends.
///
/// Lines are decoded lossily; bytes that are not UTF-8 reach the adapter as
/// replacement characters and degrade to an empty frame.
async fn feed(
    manager: &SessionManager,
    id: SessionId,
    path: &Path,
    min_confidence: f32,
    cancel: &CancellationToken,
) -> Result<(), DoseWatchError> {
    let file = tokio::fs::File::open(path).await?;
    let mut segments = BufReader::new(file).split(b'\n');
    let mut adapter = RecordedAdapter::new(min_confidence);

    let outcome: Result<(), DoseWatchError> = loop {
        let segment = tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(session_id = %id, "replay cancelled");
                break Ok(());
            }
            segment = segments.next_segment() => segment,
        };
        let bytes = match segment {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break Ok(()),
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "frame file read failed");
                break Err(e.into());
            }
        };
        let line = String::from_utf8_lossy(&bytes);
        if line.trim().is_empty() {
            continue;
        }
        match manager.process_frame(id, &adapter.observe(&line)) {
            Ok(event) if event.is_terminal() => break Ok(()),
            Ok(_) => {}
            Err(SessionError::SessionTerminated { status, .. }) => {
                tracing::info!(session_id = %id, %status, "session ended during replay");
                break Ok(());
            }
            Err(e) => break Err(e.into()),
        }
    };

    if adapter.malformed() > 0 {
        tracing::warn!(
            session_id = %id,
            malformed = adapter.malformed(),
            decoded = adapter.decoded(),
            "some recorded frames were malformed"
        );
    }
    outcome
}
