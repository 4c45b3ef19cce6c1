//! `simulate` command handler
//!
//! Loads settings and a gesture script, replays the script against a fully
//! wired controller and prints the run report.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::config::{ConfigLoader, Settings};
use crate::error::HoldWarpError;
use crate::observability::EventEmitter;
use crate::scenarios;
use crate::script::GestureScript;
use crate::simulation::{SimulationOptions, SimulationReport, run_script};

/// Scenario replayed when neither `--scenario` nor `--script` is given.
pub const DEFAULT_SCENARIO: &str = "full-charge";

/// Runs a simulation and prints its report.
///
/// # Errors
///
/// Returns a config, script or I/O error if inputs cannot be loaded, and
/// `HoldWarpError::Interrupted` if a shutdown signal cut the run short.
pub async fn run(args: &SimulateArgs, cancel: CancellationToken) -> Result<(), HoldWarpError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let settings = load_settings(args)?;
    let script = load_script(args)?;

    let events = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let options = SimulationOptions {
        render_fps: args.render_fps,
        block_autoplay: args.block_autoplay,
        ..SimulationOptions::default()
    };

    let report = run_script(&settings, &script, events, &options, cancel).await?;
    match args.format {
        OutputFormat::Human => print_human(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.interrupted {
        return Err(HoldWarpError::Interrupted);
    }
    Ok(())
}

fn load_settings(args: &SimulateArgs) -> Result<Arc<Settings>, HoldWarpError> {
    let Some(path) = &args.config else {
        return Ok(Arc::new(Settings::default()));
    };
    tracing::info!(config = %path.display(), "loading configuration");
    let loaded = ConfigLoader::with_defaults().load(path)?;
    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(loaded.settings)
}

fn load_script(args: &SimulateArgs) -> Result<GestureScript, HoldWarpError> {
    if let Some(path) = &args.script {
        tracing::info!(script = %path.display(), "loading gesture script");
        return GestureScript::load(path);
    }
    let name = args.scenario.as_deref().unwrap_or(DEFAULT_SCENARIO);
    Ok(scenarios::load_scenario(name)?)
}

fn print_human(report: &SimulationReport) {
    let s = &report.summary;
    println!("scenario: {}", s.scenario);
    println!(
        "  sessions {}  commits {}  cancellations {}  navigations {}  duck signals {}",
        s.sessions, s.commits, s.cancellations, s.navigations, s.duck_signals
    );
    if !report.timeline.is_empty() {
        println!("  timeline:");
        for entry in &report.timeline {
            println!(
                "    {:>6}ms  {:<10} {:>3}%",
                entry.at_ms,
                entry.state.to_string(),
                entry.progress
            );
        }
    }
    let path: Vec<String> = report
        .history
        .iter()
        .map(|loc| {
            if loc.warped {
                format!("{} (warped)", loc.path)
            } else {
                loc.path.clone()
            }
        })
        .collect();
    println!("  history: {}", path.join(" -> "));
    println!(
        "  final: {} [{}], music {}",
        s.final_location,
        report.final_snapshot.label(),
        if report.music_playing { "playing" } else { "paused" }
    );
    if let Some(render) = report.render {
        println!(
            "  render: {} frames, peak speed {:.1}",
            render.frames, render.peak_speed
        );
    }
    if report.interrupted {
        println!("  (interrupted after {}ms)", s.duration_ms);
    }
}
