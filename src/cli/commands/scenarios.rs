//! `scenarios` command handlers

use serde::Serialize;

use crate::cli::args::{OutputFormat, ScenariosListArgs, ScenariosShowArgs};
use crate::error::{HoldWarpError, ScriptError};
use crate::scenarios::{find_scenario, list_scenarios, suggest_scenario};

#[derive(Debug, Serialize)]
struct ScenarioRow<'a> {
    name: &'a str,
    description: &'a str,
    tags: &'a [&'a str],
}

/// Lists built-in scenarios.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn list(args: &ScenariosListArgs) -> Result<(), HoldWarpError> {
    let scenarios = list_scenarios(args.tag.as_deref());
    match args.format {
        OutputFormat::Human => {
            let width = scenarios.iter().map(|s| s.name.len()).max().unwrap_or(0);
            for s in &scenarios {
                println!("{:<width$}  {}", s.name, s.description);
            }
        }
        OutputFormat::Json => {
            let rows: Vec<ScenarioRow<'_>> = scenarios
                .iter()
                .map(|s| ScenarioRow {
                    name: s.name,
                    description: s.description,
                    tags: s.tags,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

/// Prints a scenario's YAML.
///
/// # Errors
///
/// Returns `ScriptError::UnknownScenario` if the name is not registered.
pub fn show(args: &ScenariosShowArgs) -> Result<(), HoldWarpError> {
    let scenario = find_scenario(&args.name).ok_or_else(|| ScriptError::UnknownScenario {
        name: args.name.clone(),
        suggestion: suggest_scenario(&args.name),
    })?;
    print!("{}", scenario.yaml);
    Ok(())
}
