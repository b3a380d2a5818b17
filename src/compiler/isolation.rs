// ABOUTME: Containerization heuristics for shell steps with heavy dependencies
// ABOUTME: Detects package-manager usage and suggests or applies container rewrites

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parser::ExecutorSpec;

/// Baseline image used when a shell step is rewritten for isolation.
pub const BASELINE_IMAGE: &str = "ubuntu:24.04";

static PACKAGE_MANAGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)\b(pip3? install|npm (?:install|ci)|yarn add|pnpm (?:install|add)|apt(?:-get)? install|apk add|gem install|go install|cargo install)\b",
    )
    .expect("package manager regex")
});

static MODULE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:import\s+\w+|from\s+[\w.]+\s+import\b|require\(['\x22])").expect("module import regex"));

/// Non-fatal compiler advice. `applied` is true only when the caller
/// opted into the rewrite via `prefer_isolation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub step: String,
    pub message: String,
    pub applied: bool,
}

/// Heuristic check for scripts that likely need a controlled runtime
/// environment. Returns the human-readable reason when one matches.
pub fn isolation_reason(script: &str) -> Option<String> {
    if let Some(found) = PACKAGE_MANAGER.find(script) {
        return Some(format!(
            "script installs packages at runtime ('{}')",
            found.as_str()
        ));
    }

    let imports = MODULE_IMPORT.find_iter(script).count();
    if imports >= 3 {
        return Some(format!(
            "script imports {} modules and likely needs a pinned interpreter environment",
            imports
        ));
    }

    None
}

/// Equivalent container form of a shell script, on the baseline image.
/// The script body is carried over unchanged.
pub fn containerize(script: &str) -> ExecutorSpec {
    ExecutorSpec::Container {
        image: BASELINE_IMAGE.to_string(),
        script: script.to_string(),
        args: IndexMap::new(),
        files: Vec::new(),
    }
}
