//! Background music ducking across the broadcast bus.

use std::sync::Arc;
use std::time::Duration;

use holdwarp::audio::{AudioSink, BackgroundMusic, DuckSignal, DuckingBus, MemorySink};
use holdwarp::config::{MusicSettings, Settings, Volume};
use holdwarp::navigation::MemoryHistory;
use holdwarp::observability::EventEmitter;
use holdwarp::scene::SceneHandle;
use holdwarp::warp::{ControllerDeps, WarpController};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Stage {
    controller: WarpController,
    music: Arc<BackgroundMusic>,
    music_sink: Arc<MemorySink>,
    signals: broadcast::Receiver<DuckSignal>,
    cancel: CancellationToken,
}

async fn stage(autoplay: bool) -> Stage {
    let bus = DuckingBus::default();
    let events = Arc::new(EventEmitter::noop());
    let music_sink = Arc::new(MemorySink::new("music", Volume::from_percent(50)));
    let music = Arc::new(BackgroundMusic::new(
        music_sink.clone(),
        MusicSettings {
            volume: Volume::from_percent(50),
            autoplay,
        },
        Arc::clone(&events),
    ));
    if autoplay {
        music.start().await;
    }
    let cancel = CancellationToken::new();
    drop(Arc::clone(&music).spawn_listener(&bus, cancel.clone()));
    let signals = bus.subscribe();

    let controller = WarpController::new(
        &Settings::default(),
        ControllerDeps {
            bus,
            cue: Arc::new(MemorySink::new("cue", Volume::FULL)),
            navigator: Arc::new(MemoryHistory::new("/project/alpha")),
            events,
            scene: SceneHandle::new(),
        },
    )
    .unwrap();

    Stage {
        controller,
        music,
        music_sink,
        signals,
        cancel,
    }
}

async fn at(ms: u64, origin: Instant) {
    tokio::time::sleep_until(origin + Duration::from_millis(ms)).await;
}

fn drain(rx: &mut broadcast::Receiver<DuckSignal>) -> Vec<DuckSignal> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn playing_music_pauses_and_resumes_around_warp() {
    let mut stage = stage(true).await;
    let t0 = Instant::now();
    assert!(stage.music.is_playing());

    stage.controller.start();
    at(50, t0).await;
    assert!(!stage.music.is_playing(), "ducked while charging");

    at(3600, t0).await;
    assert!(stage.music.is_playing(), "resumed after navigation");
    assert_eq!(
        drain(&mut stage.signals),
        vec![DuckSignal::Pause, DuckSignal::Resume]
    );
    stage.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn paused_music_stays_paused_after_resume() {
    let mut stage = stage(false).await;
    let t0 = Instant::now();

    stage.controller.start();
    at(100, t0).await;
    stage.controller.stop();
    at(2000, t0).await;

    assert_eq!(
        drain(&mut stage.signals),
        vec![DuckSignal::Pause, DuckSignal::Resume]
    );
    assert!(!stage.music.is_playing());
    assert_eq!(stage.music_sink.snapshot().plays, 0);
    stage.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn restart_during_fade_keeps_music_ducked() {
    let mut stage = stage(true).await;
    let t0 = Instant::now();

    stage.controller.start();
    at(410, t0).await;
    stage.controller.stop();
    at(700, t0).await;
    assert!(!stage.music.is_playing(), "still ducked during the fade");

    stage.controller.start();
    at(900, t0).await;
    assert!(!stage.music.is_playing());
    assert_eq!(
        drain(&mut stage.signals),
        vec![DuckSignal::Pause, DuckSignal::Pause],
        "an interrupted fade never publishes resume"
    );

    at(5000, t0).await;
    assert!(stage.music.is_playing());
    assert_eq!(drain(&mut stage.signals), vec![DuckSignal::Resume]);
    stage.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn music_resumes_only_after_cue_fade_finishes() {
    let stage = stage(true).await;
    let t0 = Instant::now();

    stage.controller.start();
    at(410, t0).await;
    stage.controller.stop();

    // Fade from 100% in 10% steps every 100ms reaches the floor after the
    // ninth step and stops on the tenth.
    at(1300, t0).await;
    assert!(!stage.music.is_playing());
    at(1450, t0).await;
    assert!(stage.music.is_playing());
    stage.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn blocked_music_resume_is_reported_not_fatal() {
    let stage = stage(true).await;
    let t0 = Instant::now();

    stage.controller.start();
    at(50, t0).await;
    stage.music_sink.block("autoplay blocked");

    at(3600, t0).await;
    assert!(!stage.music.is_playing());
    assert_eq!(stage.music_sink.snapshot().failures, 1);
    assert_eq!(stage.controller.stats().navigations, 1);
    assert_eq!(stage.music_sink.volume(), Volume::from_percent(50));
    stage.cancel.cancel();
}
