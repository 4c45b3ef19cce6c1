//! Warp session state.

use std::f32::consts::PI;
use std::fmt;

use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

/// Progress value at which a warp commits.
pub const COMMIT_THRESHOLD: u8 = 100;

/// Radius of the progress ring drawn around the hold button.
pub const RING_RADIUS: f32 = 60.0;

/// Interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpState {
    /// Waiting for a gesture (possibly decaying)
    #[default]
    Idle,
    /// Gesture held, progress rising
    Charging,
    /// Threshold reached, transition irreversible
    Committed,
    /// Animation window running, navigation pending
    Animating,
}

impl WarpState {
    /// Whether the warp can no longer be cancelled.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Committed | Self::Animating)
    }
}

impl fmt::Display for WarpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Charging => "charging",
            Self::Committed => "committed",
            Self::Animating => "animating",
        })
    }
}

/// Charge progress, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Progress(u8);

impl Progress {
    /// Empty.
    pub const ZERO: Self = Self(0);

    /// At the commit threshold.
    pub const FULL: Self = Self(COMMIT_THRESHOLD);

    /// Creates a progress value, clamping above the threshold.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value > COMMIT_THRESHOLD {
            Self::FULL
        } else {
            Self(value)
        }
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Applies a signed step, clamping at both ends.
    #[must_use]
    pub fn apply(self, step: i16) -> Self {
        let next = i16::from(self.0).saturating_add(step).clamp(0, i16::from(COMMIT_THRESHOLD));
        Self(u8::try_from(next).unwrap_or(COMMIT_THRESHOLD))
    }

    /// Whether the threshold has been reached.
    #[must_use]
    pub const fn is_full(self) -> bool {
        self.0 >= COMMIT_THRESHOLD
    }

    /// Whether progress is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// One hold-to-warp interaction.
///
/// Created on the first accepted `start()`; dropped once navigation fires
/// or decay returns progress to zero.
#[derive(Debug, Clone)]
pub struct WarpSession {
    /// Session identifier
    pub id: Uuid,
    /// Interaction state
    pub state: WarpState,
    /// Charge progress
    pub progress: Progress,
    /// Signed step of the active timer, 0 when none is running
    pub step: i16,
    /// When the session was created
    pub started_at: Instant,
    /// When the threshold was reached
    pub committed_at: Option<Instant>,
}

impl WarpSession {
    /// Starts a new session at zero progress.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WarpState::Idle,
            progress: Progress::ZERO,
            step: 0,
            started_at: Instant::now(),
            committed_at: None,
        }
    }

    /// Whether the session is idle with a decay timer running.
    #[must_use]
    pub const fn is_decaying(&self) -> bool {
        matches!(self.state, WarpState::Idle) && self.step < 0
    }
}

impl Default for WarpSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WarpSnapshot {
    /// Interaction state
    pub state: WarpState,
    /// Progress in `0..=100`
    pub progress: u8,
    /// Idle with a decay timer running
    pub decaying: bool,
    /// Active session, if any
    pub session_id: Option<Uuid>,
}

impl WarpSnapshot {
    pub(crate) fn of(session: Option<&WarpSession>) -> Self {
        session.map_or_else(Self::default, |s| Self {
            state: s.state,
            progress: s.progress.value(),
            decaying: s.is_decaying(),
            session_id: Some(s.id),
        })
    }

    /// Hold button label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        if self.progress >= COMMIT_THRESHOLD {
            "WARPING..."
        } else {
            "HOLD"
        }
    }

    /// Stroke dash offset for the progress ring of `radius`.
    #[must_use]
    pub fn ring_dash_offset(&self, radius: f32) -> f32 {
        ring_dash_offset(self.progress, radius)
    }
}

/// Dash offset of a ring of `radius` filled to `progress` percent: the full
/// circumference when empty, zero when full.
#[must_use]
pub fn ring_dash_offset(progress: u8, radius: f32) -> f32 {
    let circumference = 2.0 * PI * radius;
    let filled = f32::from(progress.min(COMMIT_THRESHOLD)) / 100.0;
    circumference * (1.0 - filled)
}
