// ABOUTME: Error types for workflow compilation
// ABOUTME: Defines individual compile issues and the aggregating compile error

use thiserror::Error;

/// A single structural problem discovered during compilation. Issues are
/// always collected in full; compilation never stops at the first one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileIssue {
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Circular dependency detected among steps: {steps:?}")]
    CyclicDependency { steps: Vec<String> },

    #[error("Step '{step}': missing required field '{field}'")]
    MissingField { step: String, field: String },

    #[error("Step '{step}': timeout must be greater than zero")]
    InvalidTimeout { step: String },

    #[error("Steps '{step}' and '{other}' both declare output variable '{name}'")]
    DuplicateOutput {
        name: String,
        step: String,
        other: String,
    },

    #[error("Step '{step}': invalid endpoint: {reason}")]
    InvalidEndpoint { step: String, reason: String },
}

#[derive(Error, Debug)]
#[error("Workflow compilation failed with {count} issue(s):\n{listing}", count = .issues.len(), listing = list_issues(.issues))]
pub struct CompileError {
    pub issues: Vec<CompileIssue>,
}

impl CompileError {
    pub fn new(issues: Vec<CompileIssue>) -> Self {
        Self { issues }
    }
}

fn list_issues(issues: &[CompileIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, CompileError>;
