//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};

/// Runs the `holdwarp` binary as a child process.
pub struct HoldWarpProcess;

impl HoldWarpProcess {
    /// Runs `holdwarp` with `args` to completion and captures its output.
    pub fn spawn_command(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_holdwarp"))
            .args(args)
            .env_remove("HOLDWARP_CONFIG")
            .env_remove("HOLDWARP_EVENTS_FILE")
            .env_remove("HOLDWARP_METRICS_PORT")
            .env("HOLDWARP_LOG_LEVEL", "warn")
            .output()
            .expect("failed to run holdwarp binary")
    }

    /// Absolute path of a file under `tests/fixtures/`.
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }
}
