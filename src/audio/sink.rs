//! Audio sink abstraction.
//!
//! The warp controller and the music player only ever talk to an
//! [`AudioSink`]; the simulation and the tests use [`MemorySink`], which
//! records what was asked of it and can be told to refuse playback the way
//! a browser autoplay policy would.

use std::sync::{Mutex, PoisonError};

use crate::config::Volume;
use crate::error::AudioError;

/// A single playable sound (looped music track or one-shot cue).
///
/// Only [`play`](Self::play) is asynchronous, since starting playback may
/// be refused after a delay. Every other operation takes effect
/// immediately.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync + std::fmt::Debug {
    /// Short label used in logs, metrics and events (e.g. `"cue"`).
    fn label(&self) -> &str;

    /// Starts or continues playback from the current position.
    async fn play(&self) -> Result<(), AudioError>;

    /// Pauses playback, keeping the position.
    fn pause(&self);

    /// Moves the playback position back to the start.
    fn rewind(&self);

    /// Sets the playback volume.
    fn set_volume(&self, volume: Volume);

    /// Current playback volume.
    fn volume(&self) -> Volume;

    /// Whether the sink is currently playing.
    fn is_playing(&self) -> bool;
}

/// Point-in-time view of a [`MemorySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSnapshot {
    /// Whether the sink is playing
    pub playing: bool,
    /// Current volume
    pub volume: Volume,
    /// Successful `play()` calls
    pub plays: u32,
    /// `pause()` calls that stopped playback
    pub pauses: u32,
    /// `rewind()` calls
    pub rewinds: u32,
    /// Refused `play()` calls
    pub failures: u32,
}

#[derive(Debug)]
struct SinkState {
    snapshot: SinkSnapshot,
    blocked: Option<String>,
}

/// In-memory [`AudioSink`].
#[derive(Debug)]
pub struct MemorySink {
    label: String,
    state: Mutex<SinkState>,
}

impl MemorySink {
    /// Creates a silent, paused sink at the given volume.
    #[must_use]
    pub fn new(label: impl Into<String>, volume: Volume) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(SinkState {
                snapshot: SinkSnapshot {
                    playing: false,
                    volume,
                    plays: 0,
                    pauses: 0,
                    rewinds: 0,
                    failures: 0,
                },
                blocked: None,
            }),
        }
    }

    /// Makes subsequent `play()` calls fail with
    /// [`AudioError::PlaybackBlocked`] until [`unblock`](Self::unblock).
    pub fn block(&self, reason: impl Into<String>) {
        self.lock().blocked = Some(reason.into());
    }

    /// Allows playback again.
    pub fn unblock(&self) {
        self.lock().blocked = None;
    }

    /// Returns the current counters and flags.
    #[must_use]
    pub fn snapshot(&self) -> SinkSnapshot {
        self.lock().snapshot
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl AudioSink for MemorySink {
    fn label(&self) -> &str {
        &self.label
    }

    async fn play(&self) -> Result<(), AudioError> {
        let mut state = self.lock();
        if let Some(reason) = state.blocked.clone() {
            state.snapshot.failures += 1;
            return Err(AudioError::PlaybackBlocked(reason));
        }
        state.snapshot.playing = true;
        state.snapshot.plays += 1;
        drop(state);
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.lock();
        if state.snapshot.playing {
            state.snapshot.playing = false;
            state.snapshot.pauses += 1;
        }
    }

    fn rewind(&self) {
        self.lock().snapshot.rewinds += 1;
    }

    fn set_volume(&self, volume: Volume) {
        self.lock().snapshot.volume = volume;
    }

    fn volume(&self) -> Volume {
        self.lock().snapshot.volume
    }

    fn is_playing(&self) -> bool {
        self.lock().snapshot.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn play_pause_rewind_are_recorded() {
        let sink = MemorySink::new("cue", Volume::FULL);
        sink.play().await.unwrap();
        assert!(sink.is_playing());
        sink.pause();
        sink.pause();
        sink.rewind();

        let snap = sink.snapshot();
        assert!(!snap.playing);
        assert_eq!(snap.plays, 1);
        assert_eq!(snap.pauses, 1, "pausing a paused sink is not counted");
        assert_eq!(snap.rewinds, 1);
    }

    #[tokio::test]
    async fn blocked_sink_refuses_to_play() {
        let sink = MemorySink::new("music", Volume::from_percent(50));
        sink.block("autoplay");
        assert_eq!(
            sink.play().await,
            Err(AudioError::PlaybackBlocked("autoplay".to_string()))
        );
        assert!(!sink.is_playing());
        assert_eq!(sink.snapshot().failures, 1);

        sink.unblock();
        assert!(sink.play().await.is_ok());
    }

    #[test]
    fn volume_is_stored() {
        let sink = MemorySink::new("cue", Volume::FULL);
        sink.set_volume(Volume::from_percent(30));
        assert_eq!(sink.volume().percent(), 30);
    }
}
