//! Configuration validation
//!
//! Validation runs on the raw [`HoldWarpConfig`] after environment
//! substitution and deserialization, before the settings are resolved.
//!
//! Validation collects ALL errors (doesn't stop at first) to provide
//! comprehensive feedback to users.

use std::collections::HashSet;

use crate::config::loader::{ConfigLimits, parse_duration};
use crate::config::schema::{
    ArrivalSection, CueSection, HoldWarpConfig, MusicSection, ProjectEntry, Volume, WarpSection,
};
use crate::error::{Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &HoldWarpConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        if let Some(warp) = &config.warp {
            self.validate_warp(warp);
        }
        if let Some(cue) = &config.cue {
            self.validate_cue(cue);
        }
        if let Some(music) = &config.music {
            self.validate_music(music);
        }
        if let Some(arrival) = &config.arrival {
            self.validate_arrival(arrival);
        }
        self.validate_projects(
            config.projects.as_deref(),
            config.start_project.as_deref(),
            limits,
        );

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_warp(&mut self, warp: &WarpSection) {
        if let Some(raw) = &warp.tick_interval {
            self.check_duration("warp.tick_interval", raw);
        }
        if let Some(raw) = &warp.animation_window {
            self.check_duration("warp.animation_window", raw);
        }
        if let Some(step) = warp.charge_step {
            self.check_step("warp.charge_step", step);
        }
        if let Some(step) = warp.decay_step {
            self.check_step("warp.decay_step", step);
        }
    }

    fn validate_cue(&mut self, cue: &CueSection) {
        if let Some(raw) = &cue.fade_interval {
            self.check_duration("cue.fade_interval", raw);
        }
        if let Some(step) = cue.fade_step {
            if !(step > 0.0 && step <= 1.0) {
                self.error("cue.fade_step", format!("must be in (0, 1], got {step}"));
            } else if Volume::from_fraction(step).percent() == 0 {
                self.error(
                    "cue.fade_step",
                    format!("must round to at least one percent, got {step}"),
                );
            }
        }
        if let Some(floor) = cue.fade_floor {
            if !(0.0..1.0).contains(&floor) {
                self.error("cue.fade_floor", format!("must be in [0, 1), got {floor}"));
            }
        }
        if let Some(volume) = cue.volume {
            if !(volume > 0.0 && volume <= 1.0) {
                self.error("cue.volume", format!("must be in (0, 1], got {volume}"));
            }
        }
        let floor = cue.fade_floor.unwrap_or(0.1);
        let volume = cue.volume.unwrap_or(1.0);
        if floor >= volume {
            self.error(
                "cue.fade_floor",
                format!("must be below the cue volume ({volume}), got {floor}"),
            );
        }
    }

    fn validate_music(&mut self, music: &MusicSection) {
        if let Some(volume) = music.volume {
            if !(0.0..=1.0).contains(&volume) {
                self.error("music.volume", format!("must be in [0, 1], got {volume}"));
            } else if volume <= 0.0 && music.autoplay.unwrap_or(true) {
                self.warning("music.volume", "music autoplays at zero volume".to_string());
            }
        }
    }

    fn validate_arrival(&mut self, arrival: &ArrivalSection) {
        if let Some(raw) = &arrival.window {
            self.check_duration("arrival.window", raw);
        }
    }

    fn validate_projects(
        &mut self,
        projects: Option<&[ProjectEntry]>,
        start: Option<&str>,
        limits: &ConfigLimits,
    ) {
        let Some(projects) = projects else {
            if let Some(start) = start {
                self.error(
                    "start_project",
                    format!("'{start}' set but no projects are configured"),
                );
            }
            return;
        };

        if projects.is_empty() {
            self.error("projects", "at least one project is required".to_string());
        }
        if projects.len() > limits.max_projects {
            self.error(
                "projects",
                format!(
                    "{} projects exceeds the limit of {}",
                    projects.len(),
                    limits.max_projects
                ),
            );
        }

        let mut seen = HashSet::new();
        for (i, project) in projects.iter().enumerate() {
            let path = format!("projects[{i}].id");
            if project.id.trim().is_empty() {
                self.error(&path, "project id must not be empty".to_string());
            } else if project.id.contains('/') {
                self.error(&path, format!("project id '{}' contains '/'", project.id));
            } else if !seen.insert(project.id.as_str()) {
                self.error(&path, format!("duplicate project id '{}'", project.id));
            }
        }

        if projects.len() == 1 {
            self.warning(
                "projects",
                "only one project configured; warps will return to the same page".to_string(),
            );
        }

        if let Some(start) = start {
            if !projects.iter().any(|p| p.id == start) {
                let suggestion = projects
                    .iter()
                    .map(|p| (p.id.as_str(), strsim::damerau_levenshtein(start, &p.id)))
                    .filter(|(_, dist)| *dist <= 3)
                    .min_by_key(|(_, dist)| *dist)
                    .map(|(id, _)| format!(" (did you mean '{id}'?)"))
                    .unwrap_or_default();
                self.error(
                    "start_project",
                    format!("unknown project '{start}'{suggestion}"),
                );
            }
        }
    }

    fn check_duration(&mut self, path: &str, raw: &str) {
        match parse_duration(raw) {
            Ok(d) if d.is_zero() => {
                self.error(path, "duration must be greater than zero".to_string());
            }
            Ok(_) => {}
            Err(e) => self.error(path, format!("invalid duration '{raw}': {e}")),
        }
    }

    fn check_step(&mut self, path: &str, step: i64) {
        if !(1..=100).contains(&step) {
            self.error(path, format!("must be between 1 and 100, got {step}"));
        }
    }

    fn error(&mut self, path: &str, message: String) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message,
            severity: Severity::Error,
        });
    }

    fn warning(&mut self, path: &str, message: String) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message,
            severity: Severity::Warning,
        });
    }
}
