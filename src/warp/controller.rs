//! Hold-to-warp controller.
//!
//! Owns the [`WarpSession`] and drives the [`ChargeTimer`], the cue fade,
//! the ducking bus and the navigator. Every transition runs to completion
//! under one lock, whether it comes from a gesture or from a timer task, so
//! transitions never interleave.
//!
//! ```text
//!            start()                 progress == 100
//!   Idle ───────────────▶ Charging ───────────────▶ Committed ─▶ Animating
//!    ▲  ◀─────────────────────┘                                      │
//!    │   stop() (decay + fade)                                       │
//!    └──────────────────── animation window elapsed: navigate ◀──────┘
//! ```
//!
//! Timer tasks hold only a weak reference to the controller and carry the
//! generation they were started under. A tick whose generation is stale
//! is discarded, which makes the single-timer invariant hold even when a
//! tick is already queued as its timer is replaced.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audio::{AudioSink, DuckSignal, DuckingBus, spawn_play};
use crate::config::{CueSettings, Project, Settings, WarpTiming};
use crate::error::ConfigError;
use crate::navigation::{NavigationRequest, Navigator, ProjectRing, project_route};
use crate::observability::{Event, EventEmitter, metrics};
use crate::scene::{SceneHandle, SceneMode};
use crate::warp::fade::{CueFade, FadeStep, next_step};
use crate::warp::state::{Progress, WarpSession, WarpSnapshot, WarpState};
use crate::warp::timer::ChargeTimer;

/// Collaborators handed to a [`WarpController`].
#[derive(Debug, Clone)]
pub struct ControllerDeps {
    /// Ducking channel shared with the music player
    pub bus: DuckingBus,
    /// The short warp sound cue
    pub cue: Arc<dyn AudioSink>,
    /// Where navigation requests go
    pub navigator: Arc<dyn Navigator>,
    /// Structured event sink
    pub events: Arc<EventEmitter>,
    /// Scene slot read by the render loop
    pub scene: SceneHandle,
}

/// Running totals, mainly for run summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Accepted `start()` calls
    pub starts: u64,
    /// Commits reached
    pub commits: u64,
    /// Sessions that ended at zero progress
    pub cancellations: u64,
    /// Navigations fired
    pub navigations: u64,
    /// Ducking signals published
    pub duck_signals: u64,
}

#[derive(Debug)]
struct Inner {
    session: Option<WarpSession>,
    current_project: usize,
    timer: ChargeTimer,
    timer_gen: u64,
    fade: CueFade,
    fade_gen: u64,
    cue_play: Option<JoinHandle<()>>,
    stats: ControllerStats,
}

#[derive(Debug)]
struct Shared {
    timing: WarpTiming,
    cue_settings: CueSettings,
    ring: ProjectRing,
    deps: ControllerDeps,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<WarpSnapshot>,
    shutdown: CancellationToken,
}

/// The warp state machine. Cloning shares the same controller.
#[derive(Debug, Clone)]
pub struct WarpController {
    shared: Arc<Shared>,
}

impl WarpController {
    /// Builds a controller positioned on `settings.start_project`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the project list is empty or does not
    /// contain the start project.
    pub fn new(settings: &Settings, deps: ControllerDeps) -> Result<Self, ConfigError> {
        let ring = ProjectRing::new(settings.projects.clone())?;
        let current_project =
            ring.index_of(&settings.start_project)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "start_project".to_string(),
                    value: settings.start_project.clone(),
                    expected: "a configured project id".to_string(),
                })?;

        let (snapshot, _) = watch::channel(WarpSnapshot::default());
        Ok(Self {
            shared: Arc::new(Shared {
                timing: settings.warp,
                cue_settings: settings.cue,
                ring,
                deps,
                inner: Mutex::new(Inner {
                    session: None,
                    current_project,
                    timer: ChargeTimer::new(settings.warp.tick_interval),
                    timer_gen: 0,
                    fade: CueFade::default(),
                    fade_gen: 0,
                    cue_play: None,
                    stats: ControllerStats::default(),
                }),
                snapshot,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Begins or resumes charging. Returns `false` (and does nothing) unless
    /// the controller is idle.
    ///
    /// Accepted mid-decay, charging continues from the current progress.
    /// The cue always restarts from the beginning at full volume and any
    /// release fade is abandoned without publishing `resume`.
    pub fn start(&self) -> bool {
        self.shared.start()
    }

    /// Releases the gesture. Returns `false` (and does nothing) unless the
    /// controller is charging.
    ///
    /// Below the threshold this switches the timer to decay and fades the
    /// cue out; at zero progress the cue stops at once and the session ends.
    pub fn stop(&self) -> bool {
        self.shared.stop()
    }

    /// Gesture-start entry point for the presentation layer.
    pub fn on_gesture_start(&self) -> bool {
        self.start()
    }

    /// Gesture-end entry point for the presentation layer.
    pub fn on_gesture_end(&self) -> bool {
        self.stop()
    }

    /// Current state and progress.
    #[must_use]
    pub fn snapshot(&self) -> WarpSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Watches state and progress.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WarpSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Project the visitor is currently on.
    #[must_use]
    pub fn current_project(&self) -> Project {
        let index = self.shared.lock().current_project;
        self.shared.ring.get(index).clone()
    }

    /// Project the next warp would land on.
    #[must_use]
    pub fn next_project(&self) -> Project {
        let index = self.shared.lock().current_project;
        self.shared.ring.get(self.shared.ring.next_after(index)).clone()
    }

    /// Running totals.
    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        self.shared.lock().stats
    }

    /// Cancels every timer and pending navigation.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let mut inner = self.shared.lock();
        inner.timer.cancel();
        inner.fade.cancel();
        inner.timer_gen += 1;
        inner.fade_gen += 1;
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(self: &Arc<Self>) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.session.as_ref().is_some_and(|s| s.state != WarpState::Idle) {
            debug!("start ignored: warp already in progress");
            return false;
        }

        let session = inner.session.get_or_insert_with(WarpSession::new);
        session.state = WarpState::Charging;
        session.step = i16::from(self.timing.charge_step);
        let (session_id, from_progress) = (session.id, session.progress);

        inner.timer_gen += 1;
        let generation = inner.timer_gen;
        let weak = Arc::downgrade(self);
        inner.timer.start(session.step, move |step| {
            Self::tick_from(&weak, |shared| shared.on_charge_tick(generation, step))
        });

        if inner.fade.cancel() {
            inner.fade_gen += 1;
            debug!("release fade interrupted");
        }
        self.publish(inner, DuckSignal::Pause);
        self.restart_cue(inner);

        inner.stats.starts += 1;
        metrics::record_session_started();
        let project = self.ring.get(inner.current_project).id.clone();
        info!(%session_id, project = %project, from = from_progress.value(), "charging");
        self.deps.events.emit(Event::SessionStarted {
            timestamp: Utc::now(),
            session_id,
            project,
            from_progress: from_progress.value(),
        });

        self.deps
            .scene
            .update(SceneMode::Charging, from_progress.value());
        self.publish_snapshot(inner);
        true
    }

    fn stop(self: &Arc<Self>) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if session.state != WarpState::Charging {
            debug!(state = %session.state, "stop ignored");
            return false;
        }

        let session_id = session.id;
        let progress = session.progress;
        session.state = WarpState::Idle;
        self.deps.events.emit(Event::ChargeReleased {
            timestamp: Utc::now(),
            session_id,
            progress: progress.value(),
        });
        self.deps.scene.update(SceneMode::Idle, progress.value());

        if progress.is_zero() {
            inner.timer.cancel();
            inner.timer_gen += 1;
            self.silence_cue(inner);
            self.publish(inner, DuckSignal::Resume);
            self.end_session(inner, session_id);
            return true;
        }

        session.step = -i16::from(self.timing.decay_step);
        let step = session.step;
        inner.timer_gen += 1;
        let generation = inner.timer_gen;
        let weak = Arc::downgrade(self);
        inner.timer.start(step, move |step| {
            Self::tick_from(&weak, |shared| shared.on_charge_tick(generation, step))
        });

        inner.fade_gen += 1;
        let fade_gen = inner.fade_gen;
        let weak = Arc::downgrade(self);
        inner.fade.begin(&self.cue_settings, move || {
            Self::tick_from(&weak, |shared| shared.on_fade_tick(fade_gen))
        });

        debug!(%session_id, progress = progress.value(), "released, decaying");
        self.publish_snapshot(inner);
        true
    }

    fn tick_from<F>(weak: &Weak<Self>, f: F) -> ControlFlow<()>
    where
        F: FnOnce(&Arc<Self>) -> ControlFlow<()>,
    {
        weak.upgrade()
            .map_or(ControlFlow::Break(()), |shared| f(&shared))
    }

    fn on_charge_tick(self: &Arc<Self>, generation: u64, step: i16) -> ControlFlow<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.timer_gen != generation {
            return ControlFlow::Break(());
        }
        let Some(session) = inner.session.as_mut() else {
            return ControlFlow::Break(());
        };

        session.progress = session.progress.apply(step);
        let progress = session.progress;
        let session_id = session.id;
        metrics::set_progress(progress.value());

        if step > 0 {
            if progress.is_full() {
                self.commit(inner);
                return ControlFlow::Break(());
            }
            self.deps.scene.set_progress(progress.value());
            self.publish_snapshot(inner);
            return ControlFlow::Continue(());
        }

        if progress.is_zero() {
            inner.timer.cancel();
            self.end_session(inner, session_id);
            return ControlFlow::Break(());
        }
        self.publish_snapshot(inner);
        ControlFlow::Continue(())
    }

    fn on_fade_tick(&self, generation: u64) -> ControlFlow<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.fade_gen != generation {
            return ControlFlow::Break(());
        }

        match next_step(self.deps.cue.volume(), &self.cue_settings) {
            FadeStep::Lower(volume) => {
                self.deps.cue.set_volume(volume);
                ControlFlow::Continue(())
            }
            FadeStep::Finished => {
                inner.fade.finish();
                self.deps.cue.pause();
                self.deps.cue.rewind();
                self.publish(inner, DuckSignal::Resume);
                debug!("release fade complete");
                ControlFlow::Break(())
            }
        }
    }

    fn commit(self: &Arc<Self>, inner: &mut Inner) {
        inner.timer.cancel();
        inner.timer_gen += 1;
        let target_index = self.ring.next_after(inner.current_project);
        let target = project_route(&self.ring.get(target_index).id);

        let Some(session) = inner.session.as_mut() else {
            return;
        };
        session.state = WarpState::Committed;
        session.step = 0;
        session.committed_at = Some(Instant::now());
        let session_id = session.id;
        self.publish_snapshot(inner);

        inner.stats.commits += 1;
        metrics::record_commit();
        info!(%session_id, target = %target, "warp committed");
        self.deps.events.emit(Event::WarpCommitted {
            timestamp: Utc::now(),
            session_id,
            target,
        });

        if let Some(session) = inner.session.as_mut() {
            session.state = WarpState::Animating;
        }
        self.deps.scene.update(SceneMode::WarpingOut, 100);
        self.publish_snapshot(inner);

        let weak = Arc::downgrade(self);
        let window = self.timing.animation_window;
        let shutdown = self.shutdown.clone();
        drop(tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(window) => {
                    if let Some(shared) = weak.upgrade() {
                        shared.finish_warp(session_id);
                    }
                }
            }
        }));
    }

    fn finish_warp(&self, session_id: Uuid) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(session) = inner
            .session
            .take_if(|s| s.id == session_id && s.state == WarpState::Animating)
        else {
            return;
        };

        let target_index = self.ring.next_after(inner.current_project);
        let target = project_route(&self.ring.get(target_index).id);

        self.publish(inner, DuckSignal::Resume);
        self.deps.navigator.navigate(NavigationRequest {
            target: target.clone(),
            warped: true,
        });
        inner.current_project = target_index;

        inner.stats.navigations += 1;
        metrics::record_navigation();
        metrics::set_progress(0);
        if let Some(committed_at) = session.committed_at {
            metrics::record_animation_window(committed_at.elapsed());
        }
        self.deps.events.emit(Event::Navigated {
            timestamp: Utc::now(),
            session_id,
            target,
        });

        self.deps.scene.update(SceneMode::Idle, 0);
        self.publish_snapshot(inner);
    }

    fn end_session(&self, inner: &mut Inner, session_id: Uuid) {
        inner.session = None;
        inner.stats.cancellations += 1;
        metrics::record_cancellation();
        metrics::set_progress(0);
        debug!(%session_id, "session ended without warp");
        self.deps.events.emit(Event::DecayCompleted {
            timestamp: Utc::now(),
            session_id,
        });
        self.deps.scene.update(SceneMode::Idle, 0);
        self.publish_snapshot(inner);
    }

    fn restart_cue(&self, inner: &mut Inner) {
        if let Some(previous) = inner.cue_play.take() {
            previous.abort();
        }
        let cue = &self.deps.cue;
        cue.pause();
        cue.rewind();
        cue.set_volume(self.cue_settings.volume);
        inner.cue_play = Some(spawn_play(Arc::clone(cue), Arc::clone(&self.deps.events)));
    }

    fn silence_cue(&self, inner: &mut Inner) {
        if let Some(pending) = inner.cue_play.take() {
            pending.abort();
        }
        self.deps.cue.pause();
        self.deps.cue.rewind();
    }

    fn publish(&self, inner: &mut Inner, signal: DuckSignal) {
        let receivers = self.deps.bus.publish(signal);
        inner.stats.duck_signals += 1;
        metrics::record_duck_signal(signal);
        self.deps.events.emit(Event::DuckSignalPublished {
            timestamp: Utc::now(),
            signal: signal.event_name().to_string(),
            receivers,
        });
    }

    fn publish_snapshot(&self, inner: &Inner) {
        self.snapshot
            .send_replace(WarpSnapshot::of(inner.session.as_ref()));
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::audio::MemorySink;
    use crate::config::Volume;
    use crate::navigation::MemoryHistory;

    struct Rig {
        controller: WarpController,
        cue: Arc<MemorySink>,
        history: Arc<MemoryHistory>,
        bus: DuckingBus,
        scene: SceneHandle,
    }

    fn rig() -> Rig {
        rig_with(&Settings::default())
    }

    fn rig_with(settings: &Settings) -> Rig {
        let cue = Arc::new(MemorySink::new("cue", Volume::FULL));
        let history = Arc::new(MemoryHistory::new("/project/alpha"));
        let bus = DuckingBus::default();
        let scene = SceneHandle::new();
        let controller = WarpController::new(
            settings,
            ControllerDeps {
                bus: bus.clone(),
                cue: cue.clone(),
                navigator: history.clone(),
                events: Arc::new(EventEmitter::noop()),
                scene: scene.clone(),
            },
        )
        .unwrap();
        Rig {
            controller,
            cue,
            history,
            bus,
            scene,
        }
    }

    async fn at(ms: u64, origin: Instant) {
        tokio::time::sleep_until(origin + Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn hold_commits_then_navigates_once() {
        let rig = rig();
        let t0 = Instant::now();
        assert!(rig.controller.start());

        at(990, t0).await;
        let snap = rig.controller.snapshot();
        assert_eq!(snap.state, WarpState::Charging);
        assert_eq!(snap.progress, 98);
        assert_eq!(snap.label(), "HOLD");

        at(1010, t0).await;
        let snap = rig.controller.snapshot();
        assert_eq!(snap.state, WarpState::Animating);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.label(), "WARPING...");
        assert_eq!(rig.scene.mode(), SceneMode::WarpingOut);

        assert!(!rig.controller.stop(), "commit is irreversible");
        assert!(!rig.controller.start());

        at(3490, t0).await;
        assert_eq!(rig.history.navigation_count(), 0);

        at(3510, t0).await;
        assert_eq!(rig.history.navigation_count(), 1);
        let location = rig.history.current();
        assert_eq!(location.path, "/project/beta");
        assert!(location.warped);

        let snap = rig.controller.snapshot();
        assert_eq!(snap.state, WarpState::Idle);
        assert_eq!(snap.progress, 0);
        assert_eq!(rig.controller.current_project().id, "beta");
        assert_eq!(rig.controller.next_project().id, "alpha");

        at(8000, t0).await;
        assert_eq!(rig.history.navigation_count(), 1);
        assert_eq!(rig.controller.stats().navigations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn early_release_decays_to_zero() {
        let rig = rig();
        let t0 = Instant::now();
        rig.controller.start();

        at(210, t0).await;
        assert_eq!(rig.controller.snapshot().progress, 20);
        assert!(rig.controller.stop());
        let snap = rig.controller.snapshot();
        assert_eq!(snap.state, WarpState::Idle);
        assert!(snap.decaying);

        at(260, t0).await;
        assert_eq!(rig.controller.snapshot().progress, 10);

        at(300, t0).await;
        let snap = rig.controller.snapshot();
        assert_eq!(snap.progress, 0);
        assert!(snap.session_id.is_none());
        assert!(!snap.decaying);

        at(5000, t0).await;
        assert_eq!(rig.history.navigation_count(), 0);
        assert_eq!(rig.controller.stats().cancellations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_while_charging() {
        let rig = rig();
        let t0 = Instant::now();
        assert!(rig.controller.start());
        at(110, t0).await;
        assert!(!rig.controller.start());
        at(210, t0).await;
        assert_eq!(rig.controller.snapshot().progress, 20, "one timer only");
        assert_eq!(rig.controller.stats().starts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_mid_decay_resumes_from_current_progress() {
        let rig = rig();
        let t0 = Instant::now();
        rig.controller.start();
        at(410, t0).await;
        assert_eq!(rig.controller.snapshot().progress, 40);
        rig.controller.stop();

        at(455, t0).await;
        assert_eq!(rig.controller.snapshot().progress, 30);
        let session = rig.controller.snapshot().session_id;
        assert!(rig.controller.start());
        assert_eq!(rig.controller.snapshot().session_id, session);

        at(500, t0).await;
        assert_eq!(rig.controller.snapshot().progress, 34);
        assert_eq!(rig.controller.snapshot().state, WarpState::Charging);
    }

    #[tokio::test(start_paused = true)]
    async fn instant_release_silences_cue_and_resumes() {
        let rig = rig();
        let mut signals = rig.bus.subscribe();
        rig.controller.start();
        assert!(rig.controller.stop());

        assert_eq!(signals.recv().await.unwrap(), DuckSignal::Pause);
        assert_eq!(signals.recv().await.unwrap(), DuckSignal::Resume);
        tokio::task::yield_now().await;
        assert!(!rig.cue.is_playing());
        assert!(rig.controller.snapshot().session_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn release_fades_cue_before_resume() {
        let rig = rig();
        let mut signals = rig.bus.subscribe();
        let t0 = Instant::now();
        rig.controller.start();
        assert_eq!(signals.recv().await.unwrap(), DuckSignal::Pause);

        at(210, t0).await;
        assert!(rig.cue.is_playing());
        rig.controller.stop();

        at(750, t0).await;
        assert!(signals.try_recv().is_err(), "resume waits for the fade");
        assert_eq!(rig.cue.volume().percent(), 50);

        at(1220, t0).await;
        assert_eq!(signals.try_recv().unwrap(), DuckSignal::Resume);
        assert!(!rig.cue.is_playing());
        assert!(rig.cue.snapshot().rewinds >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_fade_never_resumes() {
        let rig = rig();
        let mut signals = rig.bus.subscribe();
        let t0 = Instant::now();
        rig.controller.start();
        at(210, t0).await;
        rig.controller.stop();
        at(350, t0).await;
        rig.controller.start();
        assert_eq!(rig.cue.volume(), Volume::FULL);
        at(500, t0).await;
        rig.controller.stop();

        at(5000, t0).await;
        let mut received = Vec::new();
        while let Ok(signal) = signals.try_recv() {
            received.push(signal);
        }
        assert_eq!(
            received,
            vec![DuckSignal::Pause, DuckSignal::Pause, DuckSignal::Resume]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_cue_does_not_disturb_state_machine() {
        let rig = rig();
        rig.cue.block("autoplay");
        let t0 = Instant::now();
        rig.controller.start();
        at(1010, t0).await;
        assert_eq!(rig.controller.snapshot().state, WarpState::Animating);
        assert_eq!(rig.cue.snapshot().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_navigation() {
        let rig = rig();
        let t0 = Instant::now();
        rig.controller.start();
        at(1500, t0).await;
        rig.controller.shutdown();
        at(5000, t0).await;
        assert_eq!(rig.history.navigation_count(), 0);
        assert!(!rig.controller.start());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_fade_step_still_resumes_music() {
        let mut settings = Settings::default();
        settings.cue.fade_step = Volume::MUTE;
        let rig = rig_with(&settings);
        let mut signals = rig.bus.subscribe();
        let t0 = Instant::now();
        rig.controller.start();
        at(210, t0).await;
        rig.controller.stop();

        at(400, t0).await;
        assert_eq!(signals.try_recv().unwrap(), DuckSignal::Pause);
        assert_eq!(signals.try_recv().unwrap(), DuckSignal::Resume);
        assert!(!rig.cue.is_playing());
    }

    #[test]
    fn unknown_start_project_rejected() {
        let settings = Settings {
            start_project: "missing".to_string(),
            ..Settings::default()
        };
        let deps = ControllerDeps {
            bus: DuckingBus::default(),
            cue: Arc::new(MemorySink::new("cue", Volume::FULL)),
            navigator: Arc::new(MemoryHistory::new("/")),
            events: Arc::new(EventEmitter::noop()),
            scene: SceneHandle::new(),
        };
        assert!(WarpController::new(&settings, deps).is_err());
    }
}
