//! Logging initialization for `holdwarp`.
//!
//! Structured logging via `tracing` with human-readable and JSON output,
//! configurable verbosity, and an environment override via
//! `HOLDWARP_LOG_LEVEL`.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the `-v` verbosity flags.
pub const LOG_LEVEL_ENV: &str = "HOLDWARP_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Crate target used in filter directives.
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Default filter directives for a verbosity level.
///
/// `-v` raises only holdwarp's own targets; the exporter and runtime
/// crates stay at `warn` until `-vv`, and never go below `info`.
///
/// - 0 → `warn` everywhere
/// - 1 → holdwarp at `info`
/// - 2 → holdwarp at `debug`, dependencies at `info`
/// - 3+ → holdwarp at `trace` (saturates)
#[must_use]
pub fn default_directives(verbosity: u8) -> String {
    match verbosity {
        0 => "warn".to_string(),
        1 => format!("warn,{CRATE_TARGET}=info"),
        2 => format!("info,{CRATE_TARGET}=debug"),
        _ => format!("info,{CRATE_TARGET}=trace"),
    }
}

/// Initializes the global tracing subscriber.
///
/// If `HOLDWARP_LOG_LEVEL` is set it takes precedence over `verbosity`.
/// Logs always go to stderr so the run summary on stdout stays parseable.
///
/// Uses `try_init()`, so calling this more than once (e.g. in tests) is safe.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
