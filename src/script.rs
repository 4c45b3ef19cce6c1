//! Gesture scripts.
//!
//! A script is a timed list of gestures replayed against a warp controller
//! in virtual time:
//!
//! ```yaml
//! name: early-release
//! duration: 3s
//! steps:
//!   - at: 0ms
//!     gesture: start
//!   - at: 400ms
//!     gesture: stop
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::loader::parse_duration;
use crate::error::{HoldWarpError, ScriptError};

/// A visitor action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    /// Press and hold the warp button
    Start,
    /// Release the warp button
    Stop,
    /// Click the music toggle
    ToggleMusic,
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::ToggleMusic => "toggle_music",
        })
    }
}

/// One timed gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    /// Offset from the start of the run
    pub at: Duration,
    /// What happens
    pub gesture: Gesture,
}

/// A validated gesture script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureScript {
    /// Script name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Total virtual run time
    pub duration: Duration,
    /// Gestures in chronological order
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScript {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    duration: String,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    at: String,
    gesture: Gesture,
}

impl GestureScript {
    /// Parses and validates a script.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError` if the YAML is malformed, a duration does not
    /// parse, steps are out of order, or a step falls after the end of the
    /// run.
    pub fn from_yaml(yaml: &str) -> Result<Self, ScriptError> {
        let raw: RawScript = serde_yaml::from_str(yaml)?;
        let duration = duration_at(&raw.duration, "duration")?;

        let mut steps = Vec::with_capacity(raw.steps.len());
        let mut previous = Duration::ZERO;
        for (index, step) in raw.steps.iter().enumerate() {
            let at = duration_at(&step.at, &format!("steps[{index}].at"))?;
            if at < previous {
                return Err(ScriptError::OutOfOrder { index, at });
            }
            if at > duration {
                return Err(ScriptError::InvalidDuration {
                    value: step.at.clone(),
                    location: format!("steps[{index}].at"),
                    message: format!("after the end of the run ({})", raw.duration),
                });
            }
            previous = at;
            steps.push(ScriptStep {
                at,
                gesture: step.gesture,
            });
        }

        Ok(Self {
            name: raw.name.unwrap_or_else(|| "script".to_string()),
            description: raw.description,
            duration,
            steps,
        })
    }

    /// Reads and parses a script file. Unnamed scripts take the file stem
    /// as their name.
    ///
    /// # Errors
    ///
    /// Returns `HoldWarpError::Io` if the file cannot be read, or
    /// `HoldWarpError::Script` if it is invalid.
    pub fn load(path: &Path) -> Result<Self, HoldWarpError> {
        let yaml = std::fs::read_to_string(path)?;
        let mut script = Self::from_yaml(&yaml)?;
        if script.name == "script" {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                script.name = stem.to_string();
            }
        }
        Ok(script)
    }

    /// Number of steps with the given gesture.
    #[must_use]
    pub fn count(&self, gesture: Gesture) -> usize {
        self.steps.iter().filter(|s| s.gesture == gesture).count()
    }
}

fn duration_at(raw: &str, location: &str) -> Result<Duration, ScriptError> {
    parse_duration(raw).map_err(|e| ScriptError::InvalidDuration {
        value: raw.to_string(),
        location: location.to_string(),
        message: e.to_string(),
    })
}
