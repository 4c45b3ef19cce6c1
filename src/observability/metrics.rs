//! Metrics collection for `holdwarp`.
//!
//! Prometheus-compatible metrics with bounded label sets and typed
//! convenience functions for recording measurements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::audio::DuckSignal;
use crate::error::HoldWarpError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Audio sink labels accepted as metric labels.
const KNOWN_SINKS: [&str; 2] = ["cue", "music"];

/// Returns `sink` when it is a known label, `"__unknown__"` otherwise.
#[must_use]
pub fn sanitize_sink_label(sink: &str) -> &str {
    if KNOWN_SINKS.contains(&sink) {
        sink
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `HoldWarpError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), HoldWarpError> {
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
    .map_err(|e| HoldWarpError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("holdwarp_sessions_total", "Warp sessions started");
    describe_counter!("holdwarp_commits_total", "Warps that reached the threshold");
    describe_counter!(
        "holdwarp_cancellations_total",
        "Sessions that decayed back to zero"
    );
    describe_counter!("holdwarp_navigations_total", "Navigations fired");
    describe_counter!(
        "holdwarp_duck_signals_total",
        "Ducking signals published by kind"
    );
    describe_counter!(
        "holdwarp_audio_failures_total",
        "Audio playback failures by sink"
    );
    describe_gauge!("holdwarp_progress", "Current charge progress (0-100)");
    describe_gauge!("holdwarp_scene_speed", "Current star-field speed");
    describe_histogram!(
        "holdwarp_animation_window_ms",
        "Observed time from commit to navigation in milliseconds"
    );
}

/// Records a session start.
pub fn record_session_started() {
    counter!("holdwarp_sessions_total").increment(1);
}

/// Records a commit.
pub fn record_commit() {
    counter!("holdwarp_commits_total").increment(1);
}

/// Records a session that decayed to zero.
pub fn record_cancellation() {
    counter!("holdwarp_cancellations_total").increment(1);
}

/// Records a navigation.
pub fn record_navigation() {
    counter!("holdwarp_navigations_total").increment(1);
}

/// Records a published ducking signal.
pub fn record_duck_signal(signal: DuckSignal) {
    counter!("holdwarp_duck_signals_total", "signal" => signal.event_name()).increment(1);
}

/// Records an audio playback failure.
pub fn record_audio_failure(sink: &str) {
    counter!(
        "holdwarp_audio_failures_total",
        "sink" => sanitize_sink_label(sink).to_owned()
    )
    .increment(1);
}

/// Sets the progress gauge.
pub fn set_progress(progress: u8) {
    gauge!("holdwarp_progress").set(f64::from(progress));
}

/// Sets the scene speed gauge.
pub fn set_scene_speed(speed: f32) {
    gauge!("holdwarp_scene_speed").set(f64::from(speed));
}

/// Records the time between commit and navigation.
pub fn record_animation_window(elapsed: Duration) {
    histogram!("holdwarp_animation_window_ms").record(elapsed.as_secs_f64() * 1000.0);
}
