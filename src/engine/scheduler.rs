// ABOUTME: Wave-based orchestrator driving manifests against the runtime backend
// ABOUTME: Handles concurrency limits, retries, timeouts, skips, and cancellation

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::aggregator::ResultAggregator;
use super::context::ExecutionContext;
use super::error::ExecutionError;
use super::result::{ExecutionResult, RunEvent, RunStatus, StepResult, StepStatus};
use crate::compiler::resolver::transitive_dependents_of;
use crate::compiler::{Manifest, ManifestStep};
use crate::interp::Interpolator;
use crate::runtime::{EventKind, FinalStatus, RuntimeBackend};

const DEFAULT_MAX_CONCURRENCY: usize = 8;

pub struct Orchestrator {
    backend: Arc<dyn RuntimeBackend>,
    max_concurrency: usize,
    semaphore: Arc<Semaphore>,
    interpolator: Interpolator,
}

/// Terminal outcome of a single dispatch attempt.
enum AttemptOutcome {
    Success { output: Option<String> },
    Fault(ExecutionError),
    Cancelled,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn RuntimeBackend>) -> Self {
        Self::with_max_concurrency(backend, DEFAULT_MAX_CONCURRENCY)
    }

    pub fn with_max_concurrency(backend: Arc<dyn RuntimeBackend>, max_concurrency: usize) -> Self {
        Self {
            backend,
            max_concurrency,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            interpolator: Interpolator::new(),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Execute a compiled manifest to completion.
    pub async fn execute(
        &self,
        manifest: &Manifest,
        parameters: &HashMap<String, String>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        self.execute_with_events(manifest, parameters, cancel, None)
            .await
    }

    /// Execute a compiled manifest, optionally pushing intermediate
    /// events into the provided channel. The `Finished` event is always
    /// the last one sent.
    #[instrument(skip_all, fields(workflow = %manifest.workflow))]
    pub async fn execute_with_events(
        &self,
        manifest: &Manifest,
        parameters: &HashMap<String, String>,
        cancel: CancellationToken,
        events: Option<mpsc::Sender<RunEvent>>,
    ) -> ExecutionResult {
        let ctx = ExecutionContext::new(manifest, parameters, cancel);
        info!(
            execution_id = %ctx.execution_id,
            steps = manifest.total_steps(),
            waves = manifest.waves.len(),
            max_parallelism = manifest.max_parallelism(),
            "starting workflow execution"
        );

        let mut base = ExecutionResult::new(ctx.execution_id.clone(), manifest.workflow.clone());
        base.status = RunStatus::Running;
        base.started_at = ctx.started_at;

        let mut fatal = false;
        let mut cancelled = false;

        for (index, wave) in manifest.waves.iter().enumerate() {
            if ctx.is_cancelled() {
                cancelled = true;
                self.mark_cancelled(&ctx, manifest, &events).await;
                break;
            }

            emit(
                &events,
                RunEvent::WaveStarted {
                    index,
                    steps: wave.clone(),
                },
            )
            .await;
            info!(wave = index, steps = wave.len(), "starting wave");

            // Same-wave steps never depend on each other, so the settled
            // statuses of earlier waves fully decide runnability.
            let statuses = ctx.aggregator().step_statuses().await;
            let mut runnable = Vec::new();
            for name in wave {
                let Some(step) = manifest.step(name) else {
                    continue;
                };
                let unmet = step
                    .depends
                    .iter()
                    .find(|dep| statuses.get(dep.as_str()) != Some(&StepStatus::Succeeded));
                match unmet {
                    Some(dep) => {
                        let mut skipped = StepResult::new(name);
                        skipped.mark_completed(
                            StepStatus::Skipped,
                            None,
                            Some(format!("dependency '{}' did not succeed", dep)),
                        );
                        debug!(step = %name, dependency = %dep, "skipping step");
                        emit(
                            &events,
                            RunEvent::StepFinished {
                                step: name.clone(),
                                status: StepStatus::Skipped,
                            },
                        )
                        .await;
                        ctx.aggregator().record_step(skipped).await;
                    }
                    None => runnable.push(step),
                }
            }

            let results = join_all(
                runnable
                    .into_iter()
                    .map(|step| self.run_step(step, &ctx, &events)),
            )
            .await;

            for result in results {
                if result.status == StepStatus::Cancelled {
                    cancelled = true;
                }
                if result.status == StepStatus::Failed {
                    let tolerated = manifest
                        .step(&result.name)
                        .map(|s| s.continue_on_failure)
                        .unwrap_or(false);
                    if !tolerated {
                        fatal = true;
                    }
                }
                ctx.aggregator().record_step(result).await;
            }

            if cancelled {
                self.mark_cancelled(&ctx, manifest, &events).await;
                break;
            }
            if fatal {
                warn!(wave = index, "halting after non-tolerated step failure");
                self.skip_remaining(&ctx, manifest, &events).await;
                break;
            }
        }

        let result = ctx.aggregator().finalize(base, fatal, cancelled).await;
        info!(
            status = %result.status,
            duration = ?result.duration,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "workflow execution finished"
        );
        emit(
            &events,
            RunEvent::Finished {
                result: result.clone(),
            },
        )
        .await;
        result
    }

    /// Run one step to its terminal per-step state: interpolate, dispatch
    /// with timeout, retry on failure up to the configured limit.
    async fn run_step(
        &self,
        step: &ManifestStep,
        ctx: &ExecutionContext,
        events: &Option<mpsc::Sender<RunEvent>>,
    ) -> StepResult {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore closed");

        let mut result = StepResult::new(&step.name);

        // Dispatch-time interpolation. An unresolved reference is
        // deterministic, so it fails this step without retrying and
        // without touching its siblings.
        let scope = ctx.scope_snapshot().await;
        let payload = match self.interpolator.resolve_payload(&step.executor, &scope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(step = %step.name, error = %e, "interpolation failed");
                let error = ExecutionError::from(e);
                result.mark_completed(StepStatus::Failed, None, Some(error.to_string()));
                emit(
                    events,
                    RunEvent::StepFinished {
                        step: step.name.clone(),
                        status: result.status,
                    },
                )
                .await;
                return result;
            }
        };

        result.mark_started();
        let max_attempts = step.retry.limit + 1;

        loop {
            result.attempts += 1;
            emit(
                events,
                RunEvent::StepStarted {
                    step: step.name.clone(),
                    attempt: result.attempts,
                },
            )
            .await;
            debug!(step = %step.name, attempt = result.attempts, "dispatching step");

            match self
                .attempt_once(step, payload.clone(), ctx, &mut result.log, events)
                .await
            {
                AttemptOutcome::Success { output } => {
                    let raw = output.unwrap_or_default();
                    let value = match &step.output {
                        Some(variable) => {
                            ctx.aggregator()
                                .publish_output(&step.name, variable, &raw)
                                .await
                        }
                        None => ResultAggregator::classify_only(&step.name, &raw),
                    };
                    info!(step = %step.name, attempts = result.attempts, "step succeeded");
                    result.mark_completed(StepStatus::Succeeded, Some(value), None);
                    break;
                }
                AttemptOutcome::Cancelled => {
                    result.mark_completed(
                        StepStatus::Cancelled,
                        None,
                        Some(ExecutionError::Cancelled.to_string()),
                    );
                    break;
                }
                AttemptOutcome::Fault(error) => {
                    let message = error.to_string();
                    if error.is_retryable() && result.attempts < max_attempts {
                        warn!(
                            step = %step.name,
                            attempt = result.attempts,
                            max_attempts,
                            %message,
                            "attempt failed, retrying"
                        );
                        // Cancellation during the retry wait must not
                        // trigger one more dispatch.
                        tokio::select! {
                            _ = sleep(step.retry.interval) => {}
                            _ = ctx.cancelled() => {
                                result.mark_completed(
                                    StepStatus::Cancelled,
                                    None,
                                    Some(ExecutionError::Cancelled.to_string()),
                                );
                                break;
                            }
                        }
                        continue;
                    }
                    error!(step = %step.name, attempts = result.attempts, %message, "step failed");
                    result.mark_completed(StepStatus::Failed, None, Some(message));
                    break;
                }
            }
        }

        emit(
            events,
            RunEvent::StepFinished {
                step: step.name.clone(),
                status: result.status,
            },
        )
        .await;
        result
    }

    /// One submit-and-consume round against the runtime, bounded by the
    /// step timeout and interruptible by cancellation. In-flight
    /// invocations get a best-effort cancel on either interruption.
    async fn attempt_once(
        &self,
        step: &ManifestStep,
        payload: serde_json::Value,
        ctx: &ExecutionContext,
        log: &mut Vec<String>,
        events: &Option<mpsc::Sender<RunEvent>>,
    ) -> AttemptOutcome {
        let submission = match self.backend.submit(step, payload).await {
            Ok(submission) => submission,
            Err(e) => {
                return AttemptOutcome::Fault(ExecutionError::StepExecution {
                    message: format!("submit failed: {}", e),
                })
            }
        };
        let mut rx = match self.backend.open_events(&submission.invocation_id).await {
            Ok(rx) => rx,
            Err(e) => {
                return AttemptOutcome::Fault(ExecutionError::StepExecution {
                    message: format!("event channel failed: {}", e),
                })
            }
        };

        let consume = async {
            while let Some(event) = rx.recv().await {
                match event.kind {
                    EventKind::Log { line } => {
                        emit(
                            events,
                            RunEvent::StepLog {
                                step: step.name.clone(),
                                line: line.clone(),
                            },
                        )
                        .await;
                        log.push(line);
                    }
                    EventKind::Status { state } => {
                        log.push(format!("[{}]", state));
                    }
                    EventKind::Completed {
                        status,
                        exit_code,
                        output,
                    } => {
                        return match status {
                            FinalStatus::Succeeded => AttemptOutcome::Success { output },
                            FinalStatus::Cancelled => AttemptOutcome::Cancelled,
                            FinalStatus::Failed => {
                                AttemptOutcome::Fault(ExecutionError::StepExecution {
                                    message: match exit_code {
                                        Some(code) => {
                                            format!("runtime reported failure (exit {})", code)
                                        }
                                        None => "runtime reported failure".to_string(),
                                    },
                                })
                            }
                        };
                    }
                }
            }
            AttemptOutcome::Fault(ExecutionError::StepExecution {
                message: "event stream closed before terminal event".to_string(),
            })
        };

        tokio::select! {
            outcome = timeout(step.timeout, consume) => match outcome {
                Ok(outcome) => outcome,
                Err(_) => {
                    if let Err(e) = self.backend.cancel(&submission.invocation_id).await {
                        debug!(step = %step.name, error = %e, "cancel after timeout failed");
                    }
                    AttemptOutcome::Fault(ExecutionError::Timeout {
                        timeout: step.timeout,
                    })
                }
            },
            _ = ctx.cancelled() => {
                if let Err(e) = self.backend.cancel(&submission.invocation_id).await {
                    debug!(step = %step.name, error = %e, "cancel request failed");
                }
                AttemptOutcome::Cancelled
            }
        }
    }

    /// Skip everything not yet dispatched after a fatal failure, naming
    /// the failed dependency where there is one.
    async fn skip_remaining(
        &self,
        ctx: &ExecutionContext,
        manifest: &Manifest,
        events: &Option<mpsc::Sender<RunEvent>>,
    ) {
        let statuses = ctx.aggregator().step_statuses().await;
        let depends = manifest.dependency_map();

        let mut downstream_reason: HashMap<String, String> = HashMap::new();
        for (name, status) in &statuses {
            if *status != StepStatus::Failed {
                continue;
            }
            for dependent in transitive_dependents_of(&depends, name) {
                downstream_reason
                    .entry(dependent)
                    .or_insert_with(|| format!("dependency '{}' failed", name));
            }
        }

        for name in manifest.steps.keys() {
            if statuses.contains_key(name) {
                continue;
            }
            let reason = downstream_reason
                .get(name)
                .cloned()
                .unwrap_or_else(|| "workflow halted by a failed step".to_string());
            let mut skipped = StepResult::new(name);
            skipped.mark_completed(StepStatus::Skipped, None, Some(reason));
            emit(
                events,
                RunEvent::StepFinished {
                    step: name.clone(),
                    status: StepStatus::Skipped,
                },
            )
            .await;
            ctx.aggregator().record_step(skipped).await;
        }
    }

    /// Mark everything not yet dispatched as cancelled; no further waves
    /// are started.
    async fn mark_cancelled(
        &self,
        ctx: &ExecutionContext,
        manifest: &Manifest,
        events: &Option<mpsc::Sender<RunEvent>>,
    ) {
        let statuses = ctx.aggregator().step_statuses().await;
        for name in manifest.steps.keys() {
            if statuses.contains_key(name) {
                continue;
            }
            let mut cancelled = StepResult::new(name);
            cancelled.mark_completed(
                StepStatus::Cancelled,
                None,
                Some("cancellation requested".to_string()),
            );
            emit(
                events,
                RunEvent::StepFinished {
                    step: name.clone(),
                    status: StepStatus::Cancelled,
                },
            )
            .await;
            ctx.aggregator().record_step(cancelled).await;
        }
    }
}

async fn emit(events: &Option<mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        // A lagging or dropped consumer must never stall execution.
        let _ = tx.send(event).await;
    }
}
