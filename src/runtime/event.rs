// ABOUTME: Streamed event types emitted by the execution runtime
// ABOUTME: Defines per-step log/status events and the terminal completion record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by `submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub invocation_id: String,
    pub status: String,
}

/// One event on a step's stream. The orchestrator folds log lines into
/// the step's log history and only interprets the `Completed` terminal
/// marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Log {
        line: String,
    },
    Status {
        state: String,
    },
    Completed {
        status: FinalStatus,
        exit_code: Option<i32>,
        output: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl StepEvent {
    pub fn log(step: &str, line: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            timestamp: Utc::now(),
            kind: EventKind::Log { line: line.into() },
        }
    }

    pub fn completed(
        step: &str,
        status: FinalStatus,
        exit_code: Option<i32>,
        output: Option<String>,
    ) -> Self {
        Self {
            step: step.to_string(),
            timestamp: Utc::now(),
            kind: EventKind::Completed {
                status,
                exit_code,
                output,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Completed { .. })
    }
}
