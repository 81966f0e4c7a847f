//! Metrics collection for `DoseWatch`.
//!
//! Prometheus-compatible counters and gauges recorded through the `metrics`
//! facade. Every label value comes from a closed set, so cardinality is
//! bounded.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::DoseWatchError;
use crate::protocol::{Phase, ResultStatus};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `DoseWatchError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), DoseWatchError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| DoseWatchError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("dosewatch_frames_total", "Frames processed by live sessions");
    describe_counter!(
        "dosewatch_phase_transitions_total",
        "Phase advances by target phase"
    );
    describe_counter!(
        "dosewatch_guardrails_total",
        "Guardrail activations by kind"
    );
    describe_counter!("dosewatch_verdicts_total", "Verdicts by final status");
    describe_gauge!("dosewatch_sessions_active", "Number of live sessions");
    describe_counter!(
        "dosewatch_rejected_frames_total",
        "Rejected session operations by reason"
    );
}

/// Records one processed frame.
pub fn record_frame() {
    counter!("dosewatch_frames_total").increment(1);
}

/// Records a phase advance.
pub fn record_phase_transition(to: Phase) {
    counter!("dosewatch_phase_transitions_total", "to" => to.name()).increment(1);
}

/// Records a guardrail activation.
pub fn record_guardrail(kind: &'static str) {
    counter!("dosewatch_guardrails_total", "kind" => kind).increment(1);
}

/// Records a verdict.
pub fn record_verdict(status: ResultStatus) {
    counter!("dosewatch_verdicts_total", "status" => status.label()).increment(1);
}

/// Sets the number of live sessions.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_active(count: usize) {
    gauge!("dosewatch_sessions_active").set(count as f64);
}

/// Records a rejected session operation.
pub fn record_rejected(reason: &'static str) {
    counter!("dosewatch_rejected_frames_total", "reason" => reason).increment(1);
}
