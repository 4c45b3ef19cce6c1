//! Background music player.
//!
//! Loops a track at a fixed volume, lets the visitor toggle it, and steps
//! aside while the warp cue plays. On `music:pause` it remembers whether it
//! was playing; on `music:resume` it picks up again only if it was.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::audio::{AudioSink, DuckSignal, DuckingBus, report_failure};
use crate::config::MusicSettings;
use crate::observability::EventEmitter;

#[derive(Debug, Default)]
struct DuckState {
    /// A pause signal is in effect
    ducked: bool,
    /// Music was playing when the current pause arrived
    resume_on_release: bool,
}

/// The site's background music.
#[derive(Debug)]
pub struct BackgroundMusic {
    sink: Arc<dyn AudioSink>,
    state: Mutex<DuckState>,
    events: Arc<EventEmitter>,
}

impl BackgroundMusic {
    /// Wraps `sink`, applying the configured volume.
    ///
    /// Does not start playback; call [`start`](Self::start) for that.
    #[must_use]
    pub fn new(sink: Arc<dyn AudioSink>, settings: MusicSettings, events: Arc<EventEmitter>) -> Self {
        sink.set_volume(settings.volume);
        Self {
            sink,
            state: Mutex::new(DuckState::default()),
            events,
        }
    }

    /// Attempts autoplay. A refusal is logged and the player stays paused.
    pub async fn start(&self) {
        if let Err(e) = self.sink.play().await {
            report_failure(self.sink.label(), &e, &self.events);
        }
    }

    /// Flips between playing and paused, returning whether music is now
    /// playing.
    ///
    /// A manual toggle overrides any pending duck: the visitor's choice wins
    /// over the remembered state.
    pub async fn toggle(&self) -> bool {
        self.lock().ducked = false;
        if self.sink.is_playing() {
            self.sink.pause();
            false
        } else {
            match self.sink.play().await {
                Ok(()) => true,
                Err(e) => {
                    report_failure(self.sink.label(), &e, &self.events);
                    false
                }
            }
        }
    }

    /// Whether the track is currently audible.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.sink.is_playing()
    }

    /// Applies one ducking signal.
    pub async fn handle(&self, signal: DuckSignal) {
        match signal {
            DuckSignal::Pause => {
                let mut state = self.lock();
                if state.ducked {
                    return;
                }
                state.ducked = true;
                state.resume_on_release = self.sink.is_playing();
                drop(state);
                self.sink.pause();
                debug!("background music ducked");
            }
            DuckSignal::Resume => {
                let should_play = {
                    let mut state = self.lock();
                    let was_ducked = std::mem::take(&mut state.ducked);
                    was_ducked && std::mem::take(&mut state.resume_on_release)
                };
                if should_play {
                    if let Err(e) = self.sink.play().await {
                        report_failure(self.sink.label(), &e, &self.events);
                    } else {
                        debug!("background music resumed");
                    }
                }
            }
        }
    }

    /// Subscribes to `bus` and applies signals until `cancel` fires or the
    /// bus is dropped.
    ///
    /// The subscription is registered before this returns, so no signal
    /// published afterwards is missed.
    pub fn spawn_listener(
        self: Arc<Self>,
        bus: &DuckingBus,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let mut stream = BroadcastStream::new(bus.subscribe());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(signal)) => self.handle(signal).await,
                        Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                            warn!(skipped = n, "music listener lagged behind ducking bus");
                        }
                        None => break,
                    },
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DuckState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemorySink;
    use crate::config::Volume;

    fn player() -> (Arc<MemorySink>, BackgroundMusic) {
        let sink = Arc::new(MemorySink::new("music", Volume::FULL));
        let music = BackgroundMusic::new(
            sink.clone(),
            MusicSettings::default(),
            Arc::new(EventEmitter::noop()),
        );
        (sink, music)
    }

    #[tokio::test]
    async fn applies_configured_volume() {
        let (sink, _music) = player();
        assert_eq!(sink.volume().percent(), 50);
    }

    #[tokio::test]
    async fn pause_then_resume_restores_playing_music() {
        let (sink, music) = player();
        music.start().await;
        music.handle(DuckSignal::Pause).await;
        assert!(!sink.is_playing());
        music.handle(DuckSignal::Resume).await;
        assert!(sink.is_playing());
    }

    #[tokio::test]
    async fn resume_does_not_start_music_that_was_paused() {
        let (sink, music) = player();
        music.handle(DuckSignal::Pause).await;
        music.handle(DuckSignal::Resume).await;
        assert!(!sink.is_playing());
        assert_eq!(sink.snapshot().plays, 0);
    }

    #[tokio::test]
    async fn repeated_pause_keeps_first_memory() {
        let (sink, music) = player();
        music.start().await;
        music.handle(DuckSignal::Pause).await;
        music.handle(DuckSignal::Pause).await;
        music.handle(DuckSignal::Resume).await;
        assert!(sink.is_playing());
    }

    #[tokio::test]
    async fn resume_without_pause_is_ignored() {
        let (sink, music) = player();
        music.handle(DuckSignal::Resume).await;
        assert!(!sink.is_playing());
    }

    #[tokio::test]
    async fn toggle_flips_and_clears_duck() {
        let (sink, music) = player();
        assert!(music.toggle().await);
        music.handle(DuckSignal::Pause).await;
        assert!(music.toggle().await, "manual play while ducked");
        assert!(!music.toggle().await);
        music.handle(DuckSignal::Resume).await;
        assert!(!sink.is_playing(), "stale resume must not restart");
    }

    #[tokio::test]
    async fn blocked_playback_is_swallowed() {
        let (sink, music) = player();
        sink.block("autoplay");
        music.start().await;
        assert!(!music.is_playing());
        assert!(!music.toggle().await);
        assert_eq!(sink.snapshot().failures, 2);
    }

    #[tokio::test]
    async fn listener_follows_bus() {
        let (sink, music) = player();
        let music = Arc::new(music);
        music.start().await;
        let bus = DuckingBus::default();
        let cancel = CancellationToken::new();
        let handle = music.clone().spawn_listener(&bus, cancel.clone());

        bus.publish(DuckSignal::Pause);
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if !sink.is_playing() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!sink.is_playing());

        bus.publish(DuckSignal::Resume);
        for _ in 0..10 {
            if sink.is_playing() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(sink.is_playing());

        cancel.cancel();
        handle.await.unwrap();
    }
}
