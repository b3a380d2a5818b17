// ABOUTME: Step and workflow execution result types
// ABOUTME: Defines statuses, typed output values, and the aggregated execution result

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    CompletedWithErrors,
}

/// A step's collected output. Typed deserialization is best-effort: a
/// JSON payload matching the report shape is promoted, other JSON is
/// kept structurally, and anything else stays verbatim text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputValue {
    Report(AnalysisReport),
    Json(serde_json::Value),
    Text(String),
}

/// Structured findings record that analysis-style steps are expected to
/// emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisReport {
    pub summary: Option<String>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    #[serde(default)]
    pub severity: Severity,
    pub detail: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    pub output: Option<OutputValue>,
    pub error: Option<String>,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub workflow: String,
    pub status: RunStatus,
    pub steps: IndexMap<String, StepResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
}

/// Intermediate events yielded by the streaming execute form; the final
/// item is always `Finished`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    WaveStarted { index: usize, steps: Vec<String> },
    StepStarted { step: String, attempt: u32 },
    StepLog { step: String, line: String },
    StepFinished { step: String, status: StepStatus },
    Finished { result: ExecutionResult },
}

impl OutputValue {
    /// Literal string form used for `${NAME}` interpolation lookups.
    pub fn as_literal(&self) -> String {
        match self {
            OutputValue::Text(s) => s.clone(),
            OutputValue::Json(v) => v.to_string(),
            OutputValue::Report(r) => {
                serde_json::to_string(r).unwrap_or_else(|_| String::new())
            }
        }
    }
}

impl StepResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            output: None,
            error: None,
            attempts: 0,
            started_at: Utc::now(),
            finished_at: None,
            duration: None,
            log: Vec::new(),
        }
    }

    pub fn mark_started(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Utc::now();
    }

    pub fn mark_completed(
        &mut self,
        status: StepStatus,
        output: Option<OutputValue>,
        error: Option<String>,
    ) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.duration = Some(
            (Utc::now() - self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self.output = output;
        self.error = error;
    }

    pub fn is_successful(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, StepStatus::Failed | StepStatus::Cancelled)
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.status, StepStatus::Pending | StepStatus::Running)
    }
}

impl ExecutionResult {
    pub fn new(execution_id: String, workflow: String) -> Self {
        Self {
            execution_id,
            workflow,
            status: RunStatus::Pending,
            steps: IndexMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration: None,
        }
    }

    pub fn get_step(&self, name: &str) -> Option<&StepResult> {
        self.steps.get(name)
    }

    pub fn has_failures(&self) -> bool {
        self.steps.values().any(|s| s.status == StepStatus::Failed)
    }

    /// Execution results are plain structured data for any transport.
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::CompletedWithErrors => "completed_with_errors",
        };
        write!(f, "{}", s)
    }
}
