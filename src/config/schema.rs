//! Configuration schema types
//!
//! Two layers live here: the raw YAML shape ([`HoldWarpConfig`]), where
//! every field is optional and durations are human-readable strings, and
//! the resolved runtime [`Settings`] handed to the controller once the
//! loader has validated the raw form.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Defaults
// ============================================================================

/// Default charge/decay tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Default progress gained per charge tick.
pub const DEFAULT_CHARGE_STEP: u8 = 2;

/// Default progress lost per decay tick.
pub const DEFAULT_DECAY_STEP: u8 = 5;

/// Default delay between commit and navigation.
pub const DEFAULT_ANIMATION_WINDOW: Duration = Duration::from_millis(2500);

/// Default interval between cue fade steps.
pub const DEFAULT_FADE_INTERVAL: Duration = Duration::from_millis(100);

/// Default length of the entry animation on a warped arrival.
pub const DEFAULT_ARRIVAL_WINDOW: Duration = Duration::from_millis(2000);

// ============================================================================
// Raw configuration (YAML shape)
// ============================================================================

/// Root of a `holdwarp` configuration file.
///
/// Every section is optional; missing values fall back to the defaults
/// above.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct HoldWarpConfig {
    /// Charge, decay and commit timing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warp: Option<WarpSection>,

    /// Short warp sound cue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue: Option<CueSection>,

    /// Background music player
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicSection>,

    /// Entry animation on the destination page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<ArrivalSection>,

    /// Ordered project pages the warp cycles through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<ProjectEntry>>,

    /// Project the simulated visitor starts on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_project: Option<String>,
}

/// `warp:` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarpSection {
    /// Tick interval for charge and decay (e.g. `"20ms"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval: Option<String>,

    /// Progress added per charge tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_step: Option<i64>,

    /// Progress removed per decay tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_step: Option<i64>,

    /// Delay from commit to navigation (e.g. `"2500ms"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_window: Option<String>,
}

/// `cue:` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CueSection {
    /// Interval between fade steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_interval: Option<String>,

    /// Volume removed per fade step (fraction of full scale)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_step: Option<f32>,

    /// Volume at or below which the fade stops the cue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_floor: Option<f32>,

    /// Volume the cue restarts at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

/// `music:` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MusicSection {
    /// Playback volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    /// Whether the simulated visitor has music playing at start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
}

/// `arrival:` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrivalSection {
    /// Length of the entry animation (e.g. `"2s"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

/// One entry of the `projects:` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectEntry {
    /// Route identifier (`/project/{id}`)
    pub id: String,

    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Audio volume in whole percent, clamped to `0..=100`.
///
/// Stored as an integer so fade arithmetic is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Volume(u8);

impl Volume {
    /// Silence.
    pub const MUTE: Self = Self(0);

    /// Full scale.
    pub const FULL: Self = Self(100);

    /// Creates a volume from whole percent, clamping above 100.
    #[must_use]
    pub const fn from_percent(percent: u8) -> Self {
        if percent > 100 { Self(100) } else { Self(percent) }
    }

    /// Creates a volume from a `0.0..=1.0` fraction, rounding to the
    /// nearest percent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_fraction(fraction: f32) -> Self {
        let clamped = fraction.clamp(0.0, 1.0);
        Self((clamped * 100.0).round() as u8)
    }

    /// Returns the volume in whole percent.
    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Returns the volume as a `0.0..=1.0` fraction.
    #[must_use]
    pub fn as_fraction(self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// Lowers the volume by `step`, saturating at silence.
    #[must_use]
    pub const fn saturating_sub(self, step: Self) -> Self {
        Self(self.0.saturating_sub(step.0))
    }
}

/// Charge/decay/commit timing for the warp controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarpTiming {
    /// Interval between charge and decay ticks
    pub tick_interval: Duration,
    /// Progress gained per charge tick
    pub charge_step: u8,
    /// Progress lost per decay tick
    pub decay_step: u8,
    /// Delay between commit and navigation
    pub animation_window: Duration,
}

impl Default for WarpTiming {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            charge_step: DEFAULT_CHARGE_STEP,
            decay_step: DEFAULT_DECAY_STEP,
            animation_window: DEFAULT_ANIMATION_WINDOW,
        }
    }
}

/// Sound cue restart volume and release fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueSettings {
    /// Interval between fade steps
    pub fade_interval: Duration,
    /// Volume removed per fade step
    pub fade_step: Volume,
    /// Fade stops the cue once the volume is at or below this
    pub fade_floor: Volume,
    /// Volume applied on every restart
    pub volume: Volume,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            fade_interval: DEFAULT_FADE_INTERVAL,
            fade_step: Volume::from_percent(10),
            fade_floor: Volume::from_percent(10),
            volume: Volume::FULL,
        }
    }
}

/// Background music settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicSettings {
    /// Playback volume
    pub volume: Volume,
    /// Start playing as soon as the player is created
    pub autoplay: bool,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            volume: Volume::from_percent(50),
            autoplay: true,
        }
    }
}

/// Entry animation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalSettings {
    /// How long the warping-in animation runs
    pub window: Duration,
}

impl Default for ArrivalSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_ARRIVAL_WINDOW,
        }
    }
}

/// A project page reachable by warping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Route identifier
    pub id: String,
    /// Display title (defaults to the id)
    pub title: String,
}

impl Project {
    /// Creates a project whose title equals its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
        }
    }
}

/// Fully resolved, validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Warp timing
    pub warp: WarpTiming,
    /// Sound cue
    pub cue: CueSettings,
    /// Background music
    pub music: MusicSettings,
    /// Entry animation
    pub arrival: ArrivalSettings,
    /// Project ring, in order
    pub projects: Vec<Project>,
    /// Starting project id
    pub start_project: String,
}

impl Default for Settings {
    fn default() -> Self {
        let projects = vec![Project::new("alpha"), Project::new("beta")];
        Self {
            warp: WarpTiming::default(),
            cue: CueSettings::default(),
            music: MusicSettings::default(),
            arrival: ArrivalSettings::default(),
            start_project: projects[0].id.clone(),
            projects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_from_fraction_rounds() {
        assert_eq!(Volume::from_fraction(0.1).percent(), 10);
        assert_eq!(Volume::from_fraction(0.555).percent(), 56);
        assert_eq!(Volume::from_fraction(1.7).percent(), 100);
        assert_eq!(Volume::from_fraction(-0.2).percent(), 0);
    }

    #[test]
    fn volume_saturating_sub_stops_at_zero() {
        let v = Volume::from_percent(5);
        assert_eq!(v.saturating_sub(Volume::from_percent(10)), Volume::MUTE);
    }

    #[test]
    fn default_settings_match_observed_behaviour() {
        let settings = Settings::default();
        assert_eq!(settings.warp.tick_interval, Duration::from_millis(20));
        assert_eq!(settings.warp.charge_step, 2);
        assert_eq!(settings.warp.decay_step, 5);
        assert_eq!(settings.warp.animation_window, Duration::from_millis(2500));
        assert_eq!(settings.cue.fade_interval, Duration::from_millis(100));
        assert_eq!(settings.music.volume.percent(), 50);
        assert_eq!(settings.arrival.window, Duration::from_secs(2));
        assert_eq!(settings.start_project, "alpha");
    }

    #[test]
    fn raw_config_rejects_unknown_fields() {
        let yaml = "warp:\n  tick_intervall: 20ms\n";
        let parsed: Result<HoldWarpConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn raw_config_accepts_empty_document() {
        let parsed: HoldWarpConfig = serde_yaml::from_str("{}").unwrap();
        assert!(parsed.warp.is_none());
        assert!(parsed.projects.is_none());
    }
}
