// ABOUTME: Compiled manifest structures produced by the compiler
// ABOUTME: Immutable workflow form with resolved defaults and execution waves

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::parser::{ExecutorSpec, RetryPolicy};

/// The compiled, immutable form of a workflow. Never mutated after
/// compilation; recompiling the same definition yields a structurally
/// identical manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub workflow: String,
    pub description: Option<String>,
    pub parameters: IndexMap<String, String>,
    pub steps: IndexMap<String, ManifestStep>,
    /// Ordered execution waves; no step in a wave depends on a step in
    /// the same or a later wave.
    pub waves: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStep {
    pub name: String,
    pub executor: ExecutorSpec,
    pub depends: Vec<String>,
    pub output: Option<String>,
    pub retry: RetryPolicy,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub continue_on_failure: bool,
}

impl Manifest {
    pub fn step(&self, name: &str) -> Option<&ManifestStep> {
        self.steps.get(name)
    }

    /// Index of the wave a step belongs to
    pub fn wave_of(&self, name: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|s| s == name))
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Largest wave size, the maximum intra-wave parallelism
    pub fn max_parallelism(&self) -> usize {
        self.waves.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Dependency lists per step, for skip propagation
    pub fn dependency_map(&self) -> IndexMap<String, Vec<String>> {
        self.steps
            .iter()
            .map(|(name, step)| (name.clone(), step.depends.clone()))
            .collect()
    }

    /// Manifests are plain structured data so any transport can carry
    /// them.
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
