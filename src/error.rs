//! Error types for `holdwarp`
//!
//! The warp state machine itself has no failure modes; everything here
//! belongs to the surfaces around it (configuration, gesture scripts,
//! audio playback and the CLI).

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `holdwarp` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Gesture script error (bad duration, unknown scenario)
    pub const SCRIPT_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `holdwarp` operations.
///
/// Aggregates the domain-specific errors and maps each of them to a
/// process exit code.
#[derive(Debug, Error)]
pub enum HoldWarpError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Gesture script error
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The run was stopped by a shutdown signal
    #[error("interrupted")]
    Interrupted,
}

impl HoldWarpError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Script(_) => ExitCode::SCRIPT_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Interrupted => ExitCode::INTERRUPTED,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "projects[2].id")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Script Errors
// ============================================================================

/// Gesture script errors.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A duration string could not be parsed
    #[error("invalid duration '{value}' at {location}: {message}")]
    InvalidDuration {
        /// The raw duration text
        value: String,
        /// Where the duration appeared (e.g., "steps[1].at")
        location: String,
        /// Parser message
        message: String,
    },

    /// Steps are not in chronological order
    #[error("step {index} at {at:?} is earlier than the step before it")]
    OutOfOrder {
        /// Zero-based step index
        index: usize,
        /// Offset of the offending step
        at: std::time::Duration,
    },

    /// The requested built-in scenario does not exist
    #[error("unknown scenario '{name}'{}", suggestion_suffix(.suggestion.as_deref()))]
    UnknownScenario {
        /// Requested name
        name: String,
        /// Closest known name, if any
        suggestion: Option<String>,
    },

    /// The script YAML could not be parsed
    #[error("script parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

fn suggestion_suffix(suggestion: Option<&str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"))
}

// ============================================================================
// Audio Errors
// ============================================================================

/// Audio playback errors.
///
/// These never escape the warp controller or the music player: they are
/// logged, counted and dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    /// Playback was refused (e.g., autoplay policy)
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),

    /// The sink has been released and can no longer play
    #[error("audio sink unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        let err = HoldWarpError::Config(ConfigError::MissingFile {
            path: PathBuf::from("warp.yaml"),
        });
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn script_errors_map_to_script_exit_code() {
        let err = HoldWarpError::Script(ScriptError::UnknownScenario {
            name: "ful-charge".to_string(),
            suggestion: Some("full-charge".to_string()),
        });
        assert_eq!(err.exit_code(), ExitCode::SCRIPT_ERROR);
    }

    #[test]
    fn usage_and_io_exit_codes() {
        assert_eq!(
            HoldWarpError::Usage("bad".to_string()).exit_code(),
            ExitCode::USAGE_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(HoldWarpError::Io(io).exit_code(), ExitCode::IO_ERROR);
        assert_eq!(
            HoldWarpError::Interrupted.exit_code(),
            ExitCode::INTERRUPTED
        );
    }

    #[test]
    fn unknown_scenario_message_includes_suggestion() {
        let err = ScriptError::UnknownScenario {
            name: "ful-charge".to_string(),
            suggestion: Some("full-charge".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unknown scenario 'ful-charge' (did you mean 'full-charge'?)"
        );

        let err = ScriptError::UnknownScenario {
            name: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown scenario 'zzz'");
    }

    #[test]
    fn validation_issue_display() {
        let issue = ValidationIssue {
            path: "warp.charge_step".to_string(),
            message: "must be between 1 and 100".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: must be between 1 and 100 at warp.charge_step"
        );
    }
}
