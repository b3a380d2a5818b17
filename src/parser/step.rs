// ABOUTME: Step configuration structures and executor variant definitions
// ABOUTME: Defines the tagged executor union and per-step execution policy

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub description: Option<String>,
    #[serde(flatten)]
    pub executor: ExecutorSpec,
    #[serde(default)]
    pub depends: Vec<String>,
    /// Named variable the step's output is published under, visible to
    /// later waves as `${NAME}`.
    pub output: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub continue_on_failure: bool,
}

/// Execution payload for a step. Opaque to the orchestrator except for
/// the string fields that participate in interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorSpec {
    Shell {
        script: String,
    },
    Container {
        image: String,
        script: String,
        #[serde(default)]
        args: IndexMap<String, String>,
        #[serde(default)]
        files: Vec<AttachedFile>,
    },
    Http {
        endpoint: String,
        #[serde(default)]
        method: HttpMethod,
    },
    Agent {
        agent: String,
        message: String,
        #[serde(default)]
        tools: Vec<ToolDefinition>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    /// Integration the tool is backed by, matched against the discovery
    /// catalog when one is supplied to the compiler.
    pub integration: Option<String>,
    #[serde(default)]
    pub parameters: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first; `limit = N` means at most
    /// N + 1 attempts in total.
    #[serde(default)]
    pub limit: u32,
    #[serde(with = "humantime_serde", default = "default_retry_interval")]
    pub interval: Duration,
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(10)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 0,
            interval: default_retry_interval(),
        }
    }
}

impl ExecutorSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorSpec::Shell { .. } => "shell",
            ExecutorSpec::Container { .. } => "container",
            ExecutorSpec::Http { .. } => "http",
            ExecutorSpec::Agent { .. } => "agent",
        }
    }
}

impl std::fmt::Display for ExecutorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}
