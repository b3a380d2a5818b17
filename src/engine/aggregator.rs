// ABOUTME: Result aggregation and named-output publication
// ABOUTME: Collects step outcomes, typed-deserializes outputs, and finalizes the run

use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::result::{
    AnalysisReport, ExecutionResult, OutputValue, RunStatus, StepResult, StepStatus,
};

/// Shared collector for a single execution. Each named output is written
/// exactly once, before its step is considered terminal, and only read
/// by steps in later waves.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    inner: Arc<RwLock<AggregatorState>>,
}

#[derive(Debug, Default)]
struct AggregatorState {
    outputs: HashMap<String, OutputValue>,
    steps: IndexMap<String, StepResult>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(AggregatorState::default())),
        }
    }

    /// Classify a raw step output. Pure so the promotion rules stay
    /// independently testable.
    fn classify(step: &str, raw: &str) -> (OutputValue, Option<String>) {
        let Ok(json) = serde_json::from_str::<serde_json::Value>(raw) else {
            // Plain text never claimed to be structured; no warning.
            return (OutputValue::Text(raw.to_string()), None);
        };

        if json.is_object() {
            match serde_json::from_value::<AnalysisReport>(json.clone()) {
                Ok(report) => return (OutputValue::Report(report), None),
                Err(e) => {
                    return (
                        OutputValue::Json(json),
                        Some(format!(
                            "output of step '{}' is JSON but not a structured report ({}); raw value retained",
                            step, e
                        )),
                    )
                }
            }
        }

        (OutputValue::Json(json), None)
    }

    /// Record a completed step's raw output under its declared variable
    /// name. Deserialization failure never fails the step or the run.
    pub async fn publish_output(&self, step: &str, variable: &str, raw: &str) -> OutputValue {
        let (value, warning) = Self::classify(step, raw);
        let mut state = self.inner.write().await;
        if let Some(warning) = warning {
            warn!(step, %warning, "typed deserialization downgraded to warning");
            state.warnings.push(warning);
        }
        debug!(step, variable, "output published");
        state.outputs.insert(variable.to_string(), value.clone());
        value
    }

    /// Classify an output without publishing it under a name; used for
    /// steps that declare no output variable.
    pub fn classify_only(step: &str, raw: &str) -> OutputValue {
        Self::classify(step, raw).0
    }

    pub async fn record_step(&self, result: StepResult) {
        let mut state = self.inner.write().await;
        if result.status == StepStatus::Failed {
            if let Some(ref error) = result.error {
                state.errors.push(format!("{}: {}", result.name, error));
            }
        }
        state.steps.insert(result.name.clone(), result);
    }

    /// Literal forms of all published outputs, for interpolation scopes.
    pub async fn outputs_literal(&self) -> HashMap<String, String> {
        let state = self.inner.read().await;
        state
            .outputs
            .iter()
            .map(|(name, value)| (name.clone(), value.as_literal()))
            .collect()
    }

    pub async fn step_statuses(&self) -> HashMap<String, StepStatus> {
        let state = self.inner.read().await;
        state
            .steps
            .iter()
            .map(|(name, result)| (name.clone(), result.status))
            .collect()
    }

    /// Merge everything into the final execution result. `fatal` marks a
    /// terminal failure of a non-tolerated step; `cancelled` wins over
    /// both failure modes.
    pub async fn finalize(
        &self,
        mut result: ExecutionResult,
        fatal: bool,
        cancelled: bool,
    ) -> ExecutionResult {
        let state = self.inner.read().await;

        result.steps = state.steps.clone();
        result.errors = state.errors.clone();
        result.warnings = state.warnings.clone();
        result.finished_at = Some(Utc::now());
        result.duration = Some(
            (Utc::now() - result.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );

        let any_failed = state
            .steps
            .values()
            .any(|s| s.status == StepStatus::Failed);

        result.status = if cancelled {
            RunStatus::Cancelled
        } else if fatal {
            RunStatus::Failed
        } else if any_failed {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };

        result
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}
