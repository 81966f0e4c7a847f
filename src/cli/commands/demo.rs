//! `demo` command handler.

use std::sync::Arc;

use crate::cli::args::DemoArgs;
use crate::config::ProtocolConfig;
use crate::detection::{DetectionAdapter, MockAdapter};
use crate::error::DoseWatchError;
use crate::session::{NoopSink, SessionManager, Verdict};

/// Upper bound on scripted frames; a compliant run needs far fewer.
const MAX_DEMO_FRAMES: usize = 100_000;

/// Runs one session on scripted observations and prints its verdict.
///
/// # Errors
///
/// Returns a config error if the configuration cannot be loaded, or a
/// session error if the session cannot be driven.
pub fn run(args: &DemoArgs) -> Result<(), DoseWatchError> {
    let config = super::load_config(args.config.as_deref())?;
    let verdict = drive(&config, &args.patient)?;
    println!("{}", serde_json::to_string(&verdict)?);
    Ok(())
}

/// Feeds [`MockAdapter`] observations for the current phase until the
/// session ends.
pub(crate) fn drive(config: &ProtocolConfig, patient: &str) -> Result<Verdict, DoseWatchError> {
    let manager = SessionManager::new(config, Arc::new(NoopSink))?
        .with_model_ids(vec!["mock".to_string()]);
    let id = manager.start_session(patient)?;
    let mut adapter = MockAdapter::new();

    for _ in 0..MAX_DEMO_FRAMES {
        let Some(phase) = manager.phase(id) else {
            break;
        };
        let event = manager.process_frame(id, &adapter.observe(&phase))?;
        tracing::debug!(
            phase = event.phase.number(),
            status = %event.status_text,
            "demo frame"
        );
        if event.is_terminal() {
            break;
        }
    }

    if let Some(verdict) = manager.verdict(id) {
        return Ok(verdict);
    }
    Ok(manager.stop_session(id)?)
}
