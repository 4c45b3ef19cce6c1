//! Audio: the ducking bus, playable sinks and the background music player.

pub mod bus;
pub mod music;
pub mod sink;

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

pub use bus::{DEFAULT_BUS_CAPACITY, DuckSignal, DuckingBus};
pub use music::BackgroundMusic;
pub use sink::{AudioSink, MemorySink, SinkSnapshot};

use crate::error::AudioError;
use crate::observability::{Event, EventEmitter, metrics};

/// Logs, counts and emits an audio failure. Never propagates.
pub fn report_failure(sink: &str, error: &AudioError, events: &EventEmitter) {
    tracing::warn!(sink, error = %error, "audio playback failed");
    metrics::record_audio_failure(sink);
    events.emit(Event::AudioFailed {
        timestamp: Utc::now(),
        sink: sink.to_owned(),
        error: error.to_string(),
    });
}

/// Starts playback on a detached task so callers holding a lock never
/// await. Failures go through [`report_failure`].
pub fn spawn_play(sink: Arc<dyn AudioSink>, events: Arc<EventEmitter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = sink.play().await {
            report_failure(sink.label(), &e, &events);
        }
    })
}
