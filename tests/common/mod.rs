// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides a workflow YAML builder and a scriptable mock runtime backend

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use flotilla::compiler::ManifestStep;
use flotilla::runtime::{FinalStatus, RuntimeBackend, RuntimeError, StepEvent, Submission};

/// Opt-in log output for debugging test runs, driven by RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestWorkflowBuilder {
    name: String,
    description: Option<String>,
    parameters: Vec<(String, String)>,
    steps: Vec<TestStep>,
    timeout: Option<String>,
}

pub struct TestStep {
    pub name: String,
    pub script: String,
    pub depends: Vec<String>,
    pub output: Option<String>,
    pub retry_limit: Option<u32>,
    pub retry_interval: Option<String>,
    pub timeout: Option<String>,
    pub continue_on_failure: bool,
}

impl TestStep {
    pub fn shell(name: &str, script: &str) -> Self {
        Self {
            name: name.to_string(),
            script: script.to_string(),
            depends: Vec::new(),
            output: None,
            retry_limit: None,
            retry_interval: None,
            timeout: None,
            continue_on_failure: false,
        }
    }

    pub fn depends_on(mut self, deps: Vec<&str>) -> Self {
        self.depends = deps.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_output(mut self, variable: &str) -> Self {
        self.output = Some(variable.to_string());
        self
    }

    pub fn with_retry(mut self, limit: u32, interval: &str) -> Self {
        self.retry_limit = Some(limit);
        self.retry_interval = Some(interval.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.timeout = Some(timeout.to_string());
        self
    }

    pub fn tolerate_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }
}

impl TestWorkflowBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            parameters: Vec::new(),
            steps: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_parameter(mut self, name: &str, default: &str) -> Self {
        self.parameters.push((name.to_string(), default.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.timeout = Some(timeout.to_string());
        self
    }

    pub fn add_step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_shell_step(self, name: &str, script: &str) -> Self {
        self.add_step(TestStep::shell(name, script))
    }

    pub fn add_dependent_step(self, name: &str, script: &str, depends: Vec<&str>) -> Self {
        self.add_step(TestStep::shell(name, script).depends_on(depends))
    }

    pub fn generate_yaml(&self) -> String {
        let mut yaml = format!("name: {}\n", self.name);
        if let Some(ref description) = self.description {
            yaml.push_str(&format!("description: \"{}\"\n", description));
        }
        if let Some(ref timeout) = self.timeout {
            yaml.push_str(&format!("timeout: {}\n", timeout));
        }

        if !self.parameters.is_empty() {
            yaml.push_str("parameters:\n");
            for (name, default) in &self.parameters {
                yaml.push_str(&format!("  {}: \"{}\"\n", name, default));
            }
        }

        yaml.push_str("steps:\n");
        for step in &self.steps {
            yaml.push_str(&format!("  {}:\n", step.name));
            yaml.push_str("    kind: shell\n");
            yaml.push_str(&format!("    script: \"{}\"\n", step.script));

            if !step.depends.is_empty() {
                yaml.push_str("    depends:\n");
                for dep in &step.depends {
                    yaml.push_str(&format!("      - {}\n", dep));
                }
            }
            if let Some(ref output) = step.output {
                yaml.push_str(&format!("    output: {}\n", output));
            }
            if let Some(limit) = step.retry_limit {
                yaml.push_str("    retry:\n");
                yaml.push_str(&format!("      limit: {}\n", limit));
                if let Some(ref interval) = step.retry_interval {
                    yaml.push_str(&format!("      interval: {}\n", interval));
                }
            }
            if let Some(ref timeout) = step.timeout {
                yaml.push_str(&format!("    timeout: {}\n", timeout));
            }
            if step.continue_on_failure {
                yaml.push_str("    continue_on_failure: true\n");
            }
        }

        yaml
    }
}

/// Scripted behavior for one step in the mock runtime.
pub enum StepScript {
    Succeed { output: Option<String> },
    FailTimes { failures: u32, output: Option<String> },
    AlwaysFail { message: String },
    Hang,
}

enum PlannedOutcome {
    Complete {
        status: FinalStatus,
        exit_code: Option<i32>,
        output: Option<String>,
    },
    Hang,
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, StepScript>,
    dispatches: HashMap<String, u32>,
    payloads: HashMap<String, Vec<JsonValue>>,
    pending: HashMap<String, PlannedOutcome>,
    cancelled: Vec<String>,
    // Held open so hung invocations never see a closed stream.
    hung: Vec<mpsc::Sender<StepEvent>>,
}

/// In-process runtime backend driven by per-step scripts. Steps without
/// a script succeed with no output.
#[derive(Default)]
pub struct MockRuntime {
    inner: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, step: &str, script: StepScript) -> Self {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .insert(step.to_string(), script);
        self
    }

    pub fn dispatch_count(&self, step: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .dispatches
            .get(step)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_payload(&self, step: &str) -> Option<JsonValue> {
        self.inner
            .lock()
            .unwrap()
            .payloads
            .get(step)
            .and_then(|payloads| payloads.last().cloned())
    }

    pub fn cancelled_invocations(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancelled.clone()
    }
}

#[async_trait]
impl RuntimeBackend for MockRuntime {
    async fn submit(
        &self,
        step: &ManifestStep,
        payload: JsonValue,
    ) -> Result<Submission, RuntimeError> {
        let mut state = self.inner.lock().unwrap();
        let attempt = state.dispatches.entry(step.name.clone()).or_insert(0);
        *attempt += 1;
        let attempt = *attempt;
        state
            .payloads
            .entry(step.name.clone())
            .or_default()
            .push(payload);

        let outcome = match state.scripts.get(&step.name) {
            None | Some(StepScript::Succeed { output: None }) => PlannedOutcome::Complete {
                status: FinalStatus::Succeeded,
                exit_code: Some(0),
                output: None,
            },
            Some(StepScript::Succeed { output }) => PlannedOutcome::Complete {
                status: FinalStatus::Succeeded,
                exit_code: Some(0),
                output: output.clone(),
            },
            Some(StepScript::FailTimes { failures, output }) => {
                if attempt <= *failures {
                    PlannedOutcome::Complete {
                        status: FinalStatus::Failed,
                        exit_code: Some(1),
                        output: None,
                    }
                } else {
                    PlannedOutcome::Complete {
                        status: FinalStatus::Succeeded,
                        exit_code: Some(0),
                        output: output.clone(),
                    }
                }
            }
            Some(StepScript::AlwaysFail { .. }) => PlannedOutcome::Complete {
                status: FinalStatus::Failed,
                exit_code: Some(1),
                output: None,
            },
            Some(StepScript::Hang) => PlannedOutcome::Hang,
        };

        let invocation_id = format!("{}#{}", step.name, attempt);
        state.pending.insert(invocation_id.clone(), outcome);
        Ok(Submission {
            invocation_id,
            status: "accepted".to_string(),
        })
    }

    async fn open_events(
        &self,
        invocation_id: &str,
    ) -> Result<mpsc::Receiver<StepEvent>, RuntimeError> {
        let mut state = self.inner.lock().unwrap();
        let outcome = state
            .pending
            .remove(invocation_id)
            .ok_or_else(|| RuntimeError::UnknownInvocation(invocation_id.to_string()))?;

        let step = invocation_id
            .split('#')
            .next()
            .unwrap_or(invocation_id)
            .to_string();
        let (tx, rx) = mpsc::channel(8);
        match outcome {
            PlannedOutcome::Complete {
                status,
                exit_code,
                output,
            } => {
                let _ = tx.try_send(StepEvent::log(&step, format!("running {}", invocation_id)));
                let _ = tx.try_send(StepEvent::completed(&step, status, exit_code, output));
            }
            PlannedOutcome::Hang => {
                let _ = tx.try_send(StepEvent::log(&step, "started"));
                state.hung.push(tx);
            }
        }
        Ok(rx)
    }

    async fn cancel(&self, invocation_id: &str) -> Result<(), RuntimeError> {
        self.inner
            .lock()
            .unwrap()
            .cancelled
            .push(invocation_id.to_string());
        Ok(())
    }
}
