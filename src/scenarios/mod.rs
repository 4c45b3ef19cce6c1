//! Built-in gesture scenarios
//!
//! Scripts embedded in the binary at compile time, so
//! `holdwarp simulate --scenario full-charge` works without any files.

use std::sync::LazyLock;

use crate::error::ScriptError;
use crate::script::GestureScript;

/// A scenario embedded in the binary.
#[derive(Debug)]
pub struct BuiltinScenario {
    /// Unique identifier (kebab-case, e.g. "full-charge").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Tags for filtering.
    pub tags: &'static [&'static str],

    /// Raw YAML content.
    pub yaml: &'static str,
}

impl BuiltinScenario {
    /// Parses the embedded script.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError` if the embedded YAML is invalid.
    pub fn script(&self) -> Result<GestureScript, ScriptError> {
        GestureScript::from_yaml(self.yaml)
    }
}

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            name: "full-charge",
            description: "Hold until commit; navigates to the next project",
            tags: &["commit", "navigation"],
            yaml: include_str!("../../scenarios/full-charge.yaml"),
        },
        BuiltinScenario {
            name: "early-release",
            description: "Release at 40%; progress decays, cue fades, music resumes",
            tags: &["decay", "fade"],
            yaml: include_str!("../../scenarios/early-release.yaml"),
        },
        BuiltinScenario {
            name: "instant-release",
            description: "Release before the first tick; cue stops immediately",
            tags: &["decay"],
            yaml: include_str!("../../scenarios/instant-release.yaml"),
        },
        BuiltinScenario {
            name: "double-start",
            description: "Second press while charging is ignored",
            tags: &["commit", "idempotence"],
            yaml: include_str!("../../scenarios/double-start.yaml"),
        },
        BuiltinScenario {
            name: "release-after-commit",
            description: "Release after the threshold; the warp still lands",
            tags: &["commit", "navigation"],
            yaml: include_str!("../../scenarios/release-after-commit.yaml"),
        },
    ]
});

/// Looks up a scenario by exact name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.name == name)
}

/// Lists scenarios, optionally filtered by tag.
#[must_use]
pub fn list_scenarios(tag: Option<&str>) -> Vec<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS
        .iter()
        .filter(|s| tag.is_none_or(|t| s.tags.contains(&t)))
        .collect()
}

/// Suggests a scenario name within Damerau-Levenshtein distance 3.
#[must_use]
pub fn suggest_scenario(input: &str) -> Option<String> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|s| (s.name, strsim::damerau_levenshtein(input, s.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Resolves a scenario name to its parsed script.
///
/// # Errors
///
/// Returns `ScriptError::UnknownScenario` (with a suggestion when one is
/// close) if no scenario has that name.
pub fn load_scenario(name: &str) -> Result<GestureScript, ScriptError> {
    find_scenario(name)
        .ok_or_else(|| ScriptError::UnknownScenario {
            name: name.to_string(),
            suggestion: suggest_scenario(name),
        })?
        .script()
}

/// All scenario names in registry order.
#[must_use]
pub fn list_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|s| s.name).collect()
}
