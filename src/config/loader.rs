//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size check and BOM stripping
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing into [`HoldWarpConfig`]
//! 4. Validation (all issues collected)
//! 5. Resolution into typed [`Settings`]
//! 6. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{
    ArrivalSettings, CueSettings, HoldWarpConfig, MusicSettings, Project, Settings, Volume,
    WarpTiming,
};
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,
}

/// Limits for configuration size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of projects in the ring.
    pub max_projects: usize,

    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_projects: env_or("HOLDWARP_MAX_PROJECTS", 1000),
            max_config_size: env_or("HOLDWARP_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated settings.
    pub settings: Arc<Settings>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a configuration file and returns the frozen settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - A required environment variable is unset
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let max = self.options.config_limits.max_config_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_source(&raw, path, |name| std::env::var(name).ok())
    }

    /// Loads a configuration from an in-memory YAML string.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`load`](Self::load), minus file access.
    pub fn load_from_str(&self, yaml: &str) -> Result<LoadResult, ConfigError> {
        self.load_source(yaml, Path::new("<inline>"), |name| std::env::var(name).ok())
    }

    fn load_source<F>(&self, raw: &str, path: &Path, lookup: F) -> Result<LoadResult, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env_sub = EnvSubstitution::new(lookup);
        let substituted = env_sub.substitute(raw, path)?;
        warnings.extend(env_sub.warnings);

        if substituted.trim().is_empty() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Configuration file is empty".to_string(),
            });
        }

        let config: HoldWarpConfig =
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        let mut validator = Validator::new();
        let validation = validator.validate(&config, &self.options.config_limits);
        if validation.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: validation.errors,
            });
        }

        for issue in validation.warnings {
            warnings.push(LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            });
        }

        let settings = resolve_settings(&config)?;

        Ok(LoadResult {
            settings: Arc::new(settings),
            warnings,
        })
    }
}

/// Parses a human-readable duration such as `"20ms"`, `"2s 500ms"` or `"1m"`.
///
/// # Errors
///
/// Returns the `humantime` parser error for malformed input.
pub fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw.trim())
}

/// Resolves a validated raw configuration into runtime settings.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a value that validation should
/// have rejected slips through.
pub fn resolve_settings(config: &HoldWarpConfig) -> Result<Settings, ConfigError> {
    let defaults = Settings::default();

    let warp = config.warp.as_ref().map_or(Ok(defaults.warp), |w| {
        Ok::<_, ConfigError>(WarpTiming {
            tick_interval: duration_or(
                "warp.tick_interval",
                w.tick_interval.as_deref(),
                defaults.warp.tick_interval,
            )?,
            charge_step: step_or("warp.charge_step", w.charge_step, defaults.warp.charge_step)?,
            decay_step: step_or("warp.decay_step", w.decay_step, defaults.warp.decay_step)?,
            animation_window: duration_or(
                "warp.animation_window",
                w.animation_window.as_deref(),
                defaults.warp.animation_window,
            )?,
        })
    })?;

    let cue = config.cue.as_ref().map_or(Ok(defaults.cue), |c| {
        Ok::<_, ConfigError>(CueSettings {
            fade_interval: duration_or(
                "cue.fade_interval",
                c.fade_interval.as_deref(),
                defaults.cue.fade_interval,
            )?,
            fade_step: c.fade_step.map_or(defaults.cue.fade_step, Volume::from_fraction),
            fade_floor: c.fade_floor.map_or(defaults.cue.fade_floor, Volume::from_fraction),
            volume: c.volume.map_or(defaults.cue.volume, Volume::from_fraction),
        })
    })?;

    let music = config.music.as_ref().map_or(defaults.music, |m| MusicSettings {
        volume: m.volume.map_or(defaults.music.volume, Volume::from_fraction),
        autoplay: m.autoplay.unwrap_or(defaults.music.autoplay),
    });

    let arrival = config.arrival.as_ref().map_or(Ok(defaults.arrival), |a| {
        Ok::<_, ConfigError>(ArrivalSettings {
            window: duration_or("arrival.window", a.window.as_deref(), defaults.arrival.window)?,
        })
    })?;

    let projects: Vec<Project> = config.projects.as_ref().map_or(defaults.projects, |entries| {
        entries
            .iter()
            .map(|e| Project {
                id: e.id.clone(),
                title: e.title.clone().unwrap_or_else(|| e.id.clone()),
            })
            .collect()
    });

    let start_project = match &config.start_project {
        Some(start) => start.clone(),
        None => projects
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "projects".to_string(),
                value: "[]".to_string(),
                expected: "at least one project".to_string(),
            })?,
    };

    Ok(Settings {
        warp,
        cue,
        music,
        arrival,
        projects,
        start_project,
    })
}

fn duration_or(field: &str, raw: Option<&str>, default: Duration) -> Result<Duration, ConfigError> {
    raw.map_or(Ok(default), |value| {
        parse_duration(value).map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: format!("a duration like \"20ms\" ({e})"),
        })
    })
}

fn step_or(field: &str, raw: Option<i64>, default: u8) -> Result<u8, ConfigError> {
    raw.map_or(Ok(default), |value| {
        u8::try_from(value)
            .ok()
            .filter(|v| (1..=100).contains(v))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
                expected: "an integer between 1 and 100".to_string(),
            })
    })
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text BEFORE parsing to preserve type inference.
struct EnvSubstitution<F> {
    lookup: F,
    warnings: Vec<LoadWarning>,
}

impl<F> EnvSubstitution<F>
where
    F: Fn(&str) -> Option<String>,
{
    const fn new(lookup: F) -> Self {
        Self {
            lookup,
            warnings: Vec::new(),
        }
    }

    /// Substitutes environment variables in raw YAML text.
    ///
    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset with warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut chars = raw_yaml.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let (var_name, default, error_msg) = parse_var_spec(&mut chars, source_path)?;

                    if let Some(value) = (self.lookup)(&var_name) {
                        result.push_str(&value);
                    } else if let Some(default_val) = default {
                        result.push_str(&default_val);
                    } else if let Some(msg) = error_msg {
                        return Err(ConfigError::EnvVarNotSet {
                            var: var_name,
                            location: msg,
                        });
                    } else {
                        self.warnings.push(LoadWarning {
                            message: format!(
                                "Environment variable '{var_name}' is not set, using empty string"
                            ),
                            location: Some(source_path.display().to_string()),
                        });
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }
}

/// Parses a variable specification from `${...}`.
///
/// Returns (`var_name`, `default_value`, `error_message`).
fn parse_var_spec(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    source_path: &Path,
) -> Result<(String, Option<String>, Option<String>), ConfigError> {
    let mut var_name = String::new();

    while let Some(&c) = chars.peek() {
        chars.next();
        match c {
            '}' => return Ok((var_name, None, None)),
            ':' => match chars.peek() {
                Some('-') => {
                    chars.next();
                    let default = read_until_close(chars, source_path)?;
                    return Ok((var_name, Some(default), None));
                }
                Some('?') => {
                    chars.next();
                    let msg = read_until_close(chars, source_path)?;
                    return Ok((var_name, None, Some(msg)));
                }
                _ => var_name.push(':'),
            },
            _ => var_name.push(c),
        }
    }

    Err(ConfigError::ParseError {
        path: source_path.to_path_buf(),
        line: None,
        message: format!("Unclosed environment variable reference: ${{{var_name}"),
    })
}

/// Reads content until closing `}`, handling nested braces.
fn read_until_close(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    source_path: &Path,
) -> Result<String, ConfigError> {
    let mut value = String::new();
    let mut depth = 1;

    for c in chars.by_ref() {
        match c {
            '{' => {
                depth += 1;
                value.push(c);
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(value);
                }
                value.push(c);
            }
            _ => value.push(c),
        }
    }

    Err(ConfigError::ParseError {
        path: PathBuf::from(source_path),
        line: None,
        message: "Unclosed environment variable reference".to_string(),
    })
}

/// Reads an environment variable, falling back to `default` when unset or
/// unparseable.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
