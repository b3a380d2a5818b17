// ABOUTME: Execution context threading shared state through one run
// ABOUTME: Carries identifiers, merged parameters, cancellation, and the aggregator

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::aggregator::ResultAggregator;
use crate::compiler::Manifest;
use crate::interp::Scope;

/// Explicit per-execution state; no globals. Cloning shares the same
/// aggregator and cancellation token.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub workflow: String,
    pub started_at: DateTime<Utc>,
    parameters: HashMap<String, String>,
    cancel: CancellationToken,
    aggregator: ResultAggregator,
}

impl ExecutionContext {
    /// Merge manifest parameter defaults with caller-supplied values
    /// (caller wins) and set up fresh run state.
    pub fn new(
        manifest: &Manifest,
        overrides: &HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Self {
        let mut parameters: HashMap<String, String> = manifest
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        parameters.extend(overrides.clone());

        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow: manifest.workflow.clone(),
            started_at: Utc::now(),
            parameters,
            cancel,
            aggregator: ResultAggregator::new(),
        }
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Snapshot of everything visible to `${...}` placeholders right
    /// now: parameters plus outputs settled by earlier waves.
    pub async fn scope_snapshot(&self) -> Scope {
        let outputs = self.aggregator.outputs_literal().await;
        Scope::new(self.parameters.clone(), outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn manifest() -> Manifest {
        let mut parameters = IndexMap::new();
        parameters.insert("env".to_string(), "staging".to_string());
        Manifest {
            workflow: "wf".to_string(),
            description: None,
            parameters,
            steps: IndexMap::new(),
            waves: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_parameter_merge_and_scope() {
        let mut overrides = HashMap::new();
        overrides.insert("env".to_string(), "production".to_string());

        let context = ExecutionContext::new(&manifest(), &overrides, CancellationToken::new());
        assert!(!context.execution_id.is_empty());

        context
            .aggregator()
            .publish_output("a", "A_OUT", "forty-two")
            .await;

        let scope = context.scope_snapshot().await;
        assert_eq!(scope.lookup("env"), Some("production"));
        assert_eq!(scope.lookup("A_OUT"), Some("forty-two"));
    }

    #[tokio::test]
    async fn test_cancellation_visibility() {
        let token = CancellationToken::new();
        let context = ExecutionContext::new(&manifest(), &HashMap::new(), token.clone());

        assert!(!context.is_cancelled());
        token.cancel();
        assert!(context.is_cancelled());
    }
}
