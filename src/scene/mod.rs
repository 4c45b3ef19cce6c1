//! Warp scene parameters.
//!
//! The controller and the arrival sequence write the current
//! [`SceneMode`] and charge progress into a shared [`SceneHandle`]; the
//! render loop reads it once per frame and eases the star-field speed and
//! overlay opacity toward the mode's target.

pub mod starfield;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

pub use starfield::{Frame, Star, StarSprite, Starfield, spawn_render_loop};

/// Fraction of the remaining speed gap closed per frame.
pub const SPEED_EASING: f32 = 0.02;

/// Fraction of the remaining opacity gap closed per frame.
pub const OPACITY_EASING: f32 = 0.05;

/// Cruising speed with no warp in progress.
pub const IDLE_SPEED: f32 = 0.2;

/// Speed added at full charge.
pub const CHARGE_SPEED_RANGE: f32 = 20.0;

/// Speed while warping out, and the speed a warping-in scene starts from.
pub const WARP_SPEED: f32 = 100.0;

/// What the scene is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneMode {
    /// Nothing happening
    #[default]
    Idle,
    /// Gesture held, speed follows progress
    Charging,
    /// Committed warp, full speed
    WarpingOut,
    /// Arrival on the destination page, decelerating
    WarpingIn,
}

impl fmt::Display for SceneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Charging => "charging",
            Self::WarpingOut => "warping_out",
            Self::WarpingIn => "warping_in",
        })
    }
}

/// Star-field speed and overlay opacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneParams {
    /// Distance each star travels toward the viewer per frame
    pub speed: f32,
    /// Overlay opacity in `0.0..=1.0`
    pub opacity: f32,
}

impl SceneParams {
    /// Resting parameters.
    pub const IDLE: Self = Self {
        speed: IDLE_SPEED,
        opacity: 0.0,
    };

    /// Full-speed parameters.
    pub const WARP: Self = Self {
        speed: WARP_SPEED,
        opacity: 1.0,
    };

    /// Parameters a scene starts with when first shown in `mode`.
    #[must_use]
    pub const fn initial(mode: SceneMode) -> Self {
        match mode {
            SceneMode::WarpingIn => Self::WARP,
            _ => Self::IDLE,
        }
    }

    /// Target the scene eases toward in `mode` at `progress` percent.
    #[must_use]
    pub fn target(mode: SceneMode, progress: u8) -> Self {
        match mode {
            SceneMode::Idle | SceneMode::WarpingIn => Self::IDLE,
            SceneMode::Charging => {
                let p = f32::from(progress.min(100)) / 100.0;
                Self {
                    speed: p.mul_add(CHARGE_SPEED_RANGE, IDLE_SPEED),
                    opacity: p,
                }
            }
            SceneMode::WarpingOut => Self::WARP,
        }
    }

    /// Moves one frame closer to `target`.
    pub fn ease_toward(&mut self, target: Self) {
        self.speed += (target.speed - self.speed) * SPEED_EASING;
        self.opacity += (target.opacity - self.opacity) * OPACITY_EASING;
    }

    /// Alpha of the darkening overlay, or `None` when it is not drawn.
    #[must_use]
    pub fn overlay_alpha(&self) -> Option<f32> {
        (self.opacity > 0.01).then_some(self.opacity * 0.9)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SceneSlot {
    mode: SceneMode,
    progress: u8,
}

/// Shared, cheaply cloneable slot holding the current mode and progress.
#[derive(Debug, Clone, Default)]
pub struct SceneHandle {
    slot: Arc<Mutex<SceneSlot>>,
}

impl SceneHandle {
    /// Creates an idle handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mode, leaving progress untouched.
    pub fn set_mode(&self, mode: SceneMode) {
        self.lock().mode = mode;
    }

    /// Sets the charge progress.
    pub fn set_progress(&self, progress: u8) {
        self.lock().progress = progress;
    }

    /// Sets mode and progress together.
    pub fn update(&self, mode: SceneMode, progress: u8) {
        let mut slot = self.lock();
        slot.mode = mode;
        slot.progress = progress;
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> SceneMode {
        self.lock().mode
    }

    /// Current `(mode, progress)` pair.
    #[must_use]
    pub fn read(&self) -> (SceneMode, u8) {
        let slot = self.lock();
        (slot.mode, slot.progress)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SceneSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
