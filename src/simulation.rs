//! Scripted simulation.
//!
//! Wires a [`WarpController`] to in-memory audio sinks, a memory history,
//! the background music player, the arrival sequence and (optionally) the
//! star-field render loop, then replays a [`GestureScript`] against it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{BackgroundMusic, DuckingBus, MemorySink};
use crate::config::Settings;
use crate::error::HoldWarpError;
use crate::navigation::{Location, MemoryHistory, project_route};
use crate::observability::{Event, EventEmitter, RunSummary};
use crate::scene::starfield::{DEFAULT_STAR_COUNT, RenderStats};
use crate::scene::{SceneHandle, Starfield, spawn_render_loop};
use crate::script::{Gesture, GestureScript};
use crate::warp::{ArrivalSequence, ControllerDeps, WarpController, WarpSnapshot, WarpState};

/// Knobs for a simulated run.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Star-field frame rate; `None` disables rendering
    pub render_fps: Option<u32>,
    /// Seed for the star field
    pub star_seed: u64,
    /// Make every audio sink refuse playback
    pub block_autoplay: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            render_fps: None,
            star_seed: 0x00C0_FFEE,
            block_autoplay: false,
        }
    }
}

/// A state change observed during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Milliseconds since the run started
    pub at_ms: u64,
    /// New state
    pub state: WarpState,
    /// Progress at the change
    pub progress: u8,
}

/// Outcome of a simulated run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Aggregate counters
    pub summary: RunSummary,
    /// Every page visited
    pub history: Vec<Location>,
    /// State changes in order
    pub timeline: Vec<TimelineEntry>,
    /// Controller state at the end
    pub final_snapshot: WarpSnapshot,
    /// Whether background music was playing at the end
    pub music_playing: bool,
    /// Entry animations played
    pub arrivals: u64,
    /// Render loop totals, when rendering was enabled
    pub render: Option<RenderStats>,
    /// The run was cut short by a shutdown signal
    pub interrupted: bool,
}

/// Replays `script` against a freshly wired controller.
///
/// # Errors
///
/// Returns `HoldWarpError::Config` if the settings do not describe a
/// usable project ring.
pub async fn run_script(
    settings: &Settings,
    script: &GestureScript,
    events: Arc<EventEmitter>,
    options: &SimulationOptions,
    cancel: CancellationToken,
) -> Result<SimulationReport, HoldWarpError> {
    let tasks = cancel.child_token();
    let bus = DuckingBus::default();
    let scene = SceneHandle::new();
    let history = Arc::new(MemoryHistory::new(project_route(&settings.start_project)));

    let cue = Arc::new(MemorySink::new("cue", settings.cue.volume));
    let music_sink = Arc::new(MemorySink::new("music", settings.music.volume));
    if options.block_autoplay {
        cue.block("autoplay blocked");
        music_sink.block("autoplay blocked");
    }

    let controller = WarpController::new(
        settings,
        ControllerDeps {
            bus: bus.clone(),
            cue,
            navigator: history.clone(),
            events: Arc::clone(&events),
            scene: scene.clone(),
        },
    )?;

    let music = Arc::new(BackgroundMusic::new(
        music_sink,
        settings.music,
        Arc::clone(&events),
    ));
    if settings.music.autoplay {
        music.start().await;
    }
    let listener = Arc::clone(&music).spawn_listener(&bus, tasks.clone());

    let arrival = ArrivalSequence::new(
        Arc::clone(&history),
        scene.clone(),
        settings.arrival,
        Arc::clone(&events),
    )
    .spawn(tasks.clone());

    let render = options.render_fps.map(|fps| {
        let field = Starfield::new(1280.0, 720.0, DEFAULT_STAR_COUNT, options.star_seed);
        spawn_render_loop(scene.clone(), field, fps, tasks.clone())
    });

    let t0 = Instant::now();
    let timeline = spawn_timeline(&controller, t0, tasks.clone());

    info!(script = %script.name, steps = script.steps.len(), "simulation started");
    let mut interrupted = false;
    for step in &script.steps {
        tokio::select! {
            () = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            () = tokio::time::sleep_until(t0 + step.at) => {
                let accepted = match step.gesture {
                    Gesture::Start => controller.on_gesture_start(),
                    Gesture::Stop => controller.on_gesture_end(),
                    Gesture::ToggleMusic => {
                        music.toggle().await;
                        true
                    }
                };
                debug!(gesture = %step.gesture, at = ?step.at, accepted, "gesture");
            }
        }
    }
    if !interrupted {
        tokio::select! {
            () = cancel.cancelled() => interrupted = true,
            () = tokio::time::sleep_until(t0 + script.duration) => {}
        }
    }

    let elapsed = t0.elapsed();
    controller.shutdown();
    tasks.cancel();
    join_task("music listener", listener).await;
    let arrivals = join_task("arrival", arrival).await.unwrap_or(0);
    let timeline = join_task("timeline", timeline).await.unwrap_or_default();
    let render = match render {
        Some(handle) => join_task("render", handle).await.map(|(_, stats)| stats),
        None => None,
    };

    let stats = controller.stats();
    let summary = RunSummary {
        scenario: script.name.clone(),
        sessions: stats.starts,
        commits: stats.commits,
        cancellations: stats.cancellations,
        navigations: stats.navigations,
        duck_signals: stats.duck_signals,
        final_location: history.current().path,
        duration_ms: millis(elapsed),
    };
    events.emit(Event::RunCompleted {
        timestamp: Utc::now(),
        summary: summary.clone(),
    });
    info!(
        navigations = summary.navigations,
        commits = summary.commits,
        interrupted,
        "simulation finished"
    );

    Ok(SimulationReport {
        summary,
        history: history.entries(),
        timeline,
        final_snapshot: controller.snapshot(),
        music_playing: music.is_playing(),
        arrivals,
        render,
        interrupted,
    })
}

fn spawn_timeline(
    controller: &WarpController,
    t0: Instant,
    cancel: CancellationToken,
) -> JoinHandle<Vec<TimelineEntry>> {
    let mut rx = controller.subscribe();
    tokio::spawn(async move {
        let mut entries: Vec<TimelineEntry> = Vec::new();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snap = rx.borrow_and_update().clone();
                    if entries.last().is_none_or(|last| last.state != snap.state) {
                        entries.push(TimelineEntry {
                            at_ms: millis(t0.elapsed()),
                            state: snap.state,
                            progress: snap.progress,
                        });
                    }
                }
            }
        }
        entries
    })
}

/// Awaits a helper task, logging instead of propagating a panic or abort.
async fn join_task<T>(name: &str, handle: JoinHandle<T>) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(task = name, error = %e, "simulation task failed");
            None
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
