//! `validate` command handler

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, HoldWarpError, Severity, ValidationIssue};

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validates each configuration file and reports the outcome.
///
/// Every file is checked before returning, so one run shows all problems.
///
/// # Errors
///
/// Returns the first file's error if any file is invalid (or, with
/// `--strict`, has warnings).
pub fn run(args: &ValidateArgs) -> Result<(), HoldWarpError> {
    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<HoldWarpError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let file = path.display().to_string();
        let report = match loader.load(path) {
            Ok(loaded) => {
                let warnings: Vec<String> = loaded
                    .warnings
                    .iter()
                    .map(|w| match &w.location {
                        Some(loc) => format!("warning: {} at {loc}", w.message),
                        None => format!("warning: {}", w.message),
                    })
                    .collect();
                let valid = !(args.strict && !warnings.is_empty());
                if !valid && first_error.is_none() {
                    first_error = Some(
                        ConfigError::ValidationError {
                            path: file.clone(),
                            errors: loaded
                                .warnings
                                .iter()
                                .map(|w| ValidationIssue {
                                    path: w.location.clone().unwrap_or_default(),
                                    message: w.message.clone(),
                                    severity: Severity::Warning,
                                })
                                .collect(),
                        }
                        .into(),
                    );
                }
                FileReport {
                    file,
                    valid,
                    errors: Vec::new(),
                    warnings,
                }
            }
            Err(err) => {
                let errors = match &err {
                    ConfigError::ValidationError { errors, .. } => {
                        errors.iter().map(ToString::to_string).collect()
                    }
                    other => vec![other.to_string()],
                };
                if first_error.is_none() {
                    first_error = Some(err.into());
                }
                FileReport {
                    file,
                    valid: false,
                    errors,
                    warnings: Vec::new(),
                }
            }
        };
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let mark = if report.valid { "ok" } else { "FAIL" };
                println!("{mark}: {}", report.file);
                for line in report.errors.iter().chain(&report.warnings) {
                    println!("  {line}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_error.map_or(Ok(()), Err)
}
