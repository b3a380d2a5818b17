// ABOUTME: Workflow compiler producing immutable manifests and diagnostics
// ABOUTME: Validates structure, applies defaults, and emits isolation suggestions

pub mod error;
pub mod isolation;
pub mod manifest;
pub mod resolver;

pub use error::{CompileError, CompileIssue};
pub use isolation::Suggestion;
pub use manifest::{Manifest, ManifestStep};
pub use resolver::DependencyGraph;

use indexmap::IndexMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::parser::{ExecutorSpec, RetryPolicy, StepConfig, Workflow};
use crate::runtime::discovery::DiscoveryCatalog;

/// Applied to steps that set neither their own timeout nor a workflow
/// default.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Rewrite dependency-heavy shell steps into container steps instead
    /// of only suggesting the rewrite.
    pub prefer_isolation: bool,
    /// Read-only discovery listings used to annotate suggestions; never
    /// required for correctness.
    pub discovery: Option<DiscoveryCatalog>,
}

/// Successful compilation output: the manifest plus non-fatal advice.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub manifest: Manifest,
    pub suggestions: Vec<Suggestion>,
}

pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compile a workflow definition into a manifest, or report every
    /// discovered structural problem at once.
    pub fn compile(&self, workflow: &Workflow) -> Result<Compilation, CompileError> {
        let mut issues = Vec::new();

        for (name, step) in &workflow.steps {
            self.check_step_fields(name, step, &mut issues);
        }
        self.check_output_uniqueness(workflow, &mut issues);
        if let Some(timeout) = workflow.timeout {
            if timeout.is_zero() {
                issues.push(CompileIssue::InvalidTimeout {
                    step: format!("<workflow '{}'>", workflow.name),
                });
            }
        }

        // Graph validation; waves are only meaningful when references
        // resolved, so the phases stay sequential while issues keep
        // accumulating.
        let waves = match DependencyGraph::from_steps(&workflow.steps) {
            Ok(graph) => match graph.waves() {
                Ok(waves) => Some(waves),
                Err(graph_issues) => {
                    issues.extend(graph_issues);
                    None
                }
            },
            Err(graph_issues) => {
                issues.extend(graph_issues);
                None
            }
        };

        if !issues.is_empty() {
            return Err(CompileError::new(issues));
        }
        let waves = waves.expect("waves computed when no issues found");

        let mut suggestions = Vec::new();
        let mut steps = IndexMap::new();
        for (name, step) in &workflow.steps {
            let executor = self.executor_for(name, step, &mut suggestions);
            steps.insert(
                name.clone(),
                ManifestStep {
                    name: name.clone(),
                    executor,
                    depends: step.depends.clone(),
                    output: step.output.clone(),
                    retry: step.retry.clone().unwrap_or_default(),
                    timeout: step
                        .timeout
                        .or(workflow.timeout)
                        .unwrap_or(DEFAULT_STEP_TIMEOUT),
                    continue_on_failure: step.continue_on_failure,
                },
            );
        }

        if let Some(ref catalog) = self.options.discovery {
            self.annotate_from_discovery(workflow, catalog, &mut suggestions);
        }

        info!(
            workflow = %workflow.name,
            steps = steps.len(),
            waves = waves.len(),
            suggestions = suggestions.len(),
            "workflow compiled"
        );

        Ok(Compilation {
            manifest: Manifest {
                workflow: workflow.name.clone(),
                description: workflow.description.clone(),
                parameters: workflow.parameters.clone(),
                steps,
                waves,
            },
            suggestions,
        })
    }

    fn check_step_fields(&self, name: &str, step: &StepConfig, issues: &mut Vec<CompileIssue>) {
        let missing = |field: &str| CompileIssue::MissingField {
            step: name.to_string(),
            field: field.to_string(),
        };

        match &step.executor {
            ExecutorSpec::Shell { script } => {
                if script.trim().is_empty() {
                    issues.push(missing("script"));
                }
            }
            ExecutorSpec::Container { image, script, .. } => {
                if image.trim().is_empty() {
                    issues.push(missing("image"));
                }
                if script.trim().is_empty() {
                    issues.push(missing("script"));
                }
            }
            ExecutorSpec::Http { endpoint, .. } => {
                if endpoint.trim().is_empty() {
                    issues.push(missing("endpoint"));
                } else if !crate::interp::Interpolator::new().has_placeholders(endpoint) {
                    // Endpoints with placeholders can only be checked at
                    // dispatch time, once resolved.
                    if let Err(e) = Url::parse(endpoint) {
                        issues.push(CompileIssue::InvalidEndpoint {
                            step: name.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            ExecutorSpec::Agent { agent, message, .. } => {
                if agent.trim().is_empty() {
                    issues.push(missing("agent"));
                }
                if message.trim().is_empty() {
                    issues.push(missing("message"));
                }
            }
        }

        if let Some(timeout) = step.timeout {
            if timeout.is_zero() {
                issues.push(CompileIssue::InvalidTimeout {
                    step: name.to_string(),
                });
            }
        }
    }

    fn check_output_uniqueness(&self, workflow: &Workflow, issues: &mut Vec<CompileIssue>) {
        let mut seen: IndexMap<&str, &str> = IndexMap::new();
        for (name, step) in &workflow.steps {
            if let Some(ref output) = step.output {
                if let Some(first) = seen.get(output.as_str()) {
                    issues.push(CompileIssue::DuplicateOutput {
                        name: output.clone(),
                        step: name.clone(),
                        other: first.to_string(),
                    });
                } else {
                    seen.insert(output.as_str(), name.as_str());
                }
            }
        }
    }

    /// Pick the step's final executor, emitting an isolation suggestion
    /// for dependency-heavy shell scripts. The rewrite is only applied
    /// when the caller opted in.
    fn executor_for(
        &self,
        name: &str,
        step: &StepConfig,
        suggestions: &mut Vec<Suggestion>,
    ) -> ExecutorSpec {
        if let ExecutorSpec::Shell { script } = &step.executor {
            if let Some(reason) = isolation::isolation_reason(script) {
                let applied = self.options.prefer_isolation;
                debug!(step = %name, %reason, applied, "isolation candidate");
                suggestions.push(Suggestion {
                    step: name.to_string(),
                    message: if applied {
                        format!(
                            "rewritten as a container step on {}: {}",
                            isolation::BASELINE_IMAGE,
                            reason
                        )
                    } else {
                        format!(
                            "consider a container step on {}: {}",
                            isolation::BASELINE_IMAGE,
                            reason
                        )
                    },
                    applied,
                });
                if applied {
                    return isolation::containerize(script);
                }
            }
        }
        step.executor.clone()
    }

    /// Annotate suggestions from the discovery listings. Advisory only;
    /// compilation and execution never depend on these.
    fn annotate_from_discovery(
        &self,
        workflow: &Workflow,
        catalog: &DiscoveryCatalog,
        suggestions: &mut Vec<Suggestion>,
    ) {
        if catalog.online_runners().is_empty() {
            suggestions.push(Suggestion {
                step: format!("<workflow '{}'>", workflow.name),
                message: "no online runners are currently available".to_string(),
                applied: false,
            });
        }

        for (name, step) in &workflow.steps {
            let ExecutorSpec::Agent { tools, .. } = &step.executor else {
                continue;
            };
            for tool in tools {
                let Some(ref integration) = tool.integration else {
                    continue;
                };
                let Some(info) = catalog.integration(integration) else {
                    suggestions.push(Suggestion {
                        step: name.clone(),
                        message: format!(
                            "tool '{}' references unknown integration '{}'",
                            tool.name, integration
                        ),
                        applied: false,
                    });
                    continue;
                };
                for secret in &info.required_secrets {
                    if !catalog.has_secret(secret) {
                        suggestions.push(Suggestion {
                            step: name.clone(),
                            message: format!(
                                "integration '{}' requires secret '{}' which is not configured",
                                integration, secret
                            ),
                            applied: false,
                        });
                    }
                }
            }
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(yaml: &str) -> Workflow {
        Workflow::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_compile_aggregates_all_issues() {
        let wf = workflow(
            r#"
name: broken
steps:
  a:
    kind: shell
    script: ""
    timeout: 0s
  b:
    kind: http
    endpoint: "not a url"
    depends: [ghost]
"#,
        );

        let error = Compiler::default().compile(&wf).unwrap_err();
        assert_eq!(error.issues.len(), 4);
        assert!(error
            .issues
            .iter()
            .any(|i| matches!(i, CompileIssue::MissingField { .. })));
        assert!(error
            .issues
            .iter()
            .any(|i| matches!(i, CompileIssue::InvalidTimeout { .. })));
        assert!(error
            .issues
            .iter()
            .any(|i| matches!(i, CompileIssue::InvalidEndpoint { .. })));
        assert!(error
            .issues
            .iter()
            .any(|i| matches!(i, CompileIssue::UnknownDependency { .. })));
    }

    #[test]
    fn test_duplicate_outputs_rejected() {
        let wf = workflow(
            r#"
name: dupes
steps:
  a:
    kind: shell
    script: "true"
    output: RESULT
  b:
    kind: shell
    script: "true"
    output: RESULT
"#,
        );

        let error = Compiler::default().compile(&wf).unwrap_err();
        assert!(matches!(
            error.issues[0],
            CompileIssue::DuplicateOutput { .. }
        ));
    }

    #[test]
    fn test_defaults_applied() {
        let wf = workflow(
            r#"
name: defaults
timeout: 10m
steps:
  a:
    kind: shell
    script: "true"
  b:
    kind: shell
    script: "true"
    timeout: 30s
"#,
        );

        let compilation = Compiler::default().compile(&wf).unwrap();
        let a = compilation.manifest.step("a").unwrap();
        assert_eq!(a.timeout, Duration::from_secs(600));
        assert_eq!(a.retry.limit, 0);

        let b = compilation.manifest.step("b").unwrap();
        assert_eq!(b.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let wf = workflow(
            r#"
name: stable
steps:
  a:
    kind: shell
    script: "true"
  b:
    kind: shell
    script: "true"
    depends: [a]
  c:
    kind: shell
    script: "true"
    depends: [a]
"#,
        );

        let compiler = Compiler::default();
        let first = compiler.compile(&wf).unwrap();
        let second = compiler.compile(&wf).unwrap();
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(first.manifest.waves, vec![vec!["a"], vec!["b", "c"]]);
    }

    #[test]
    fn test_isolation_suggested_but_not_applied_by_default() {
        let wf = workflow(
            r#"
name: heavy
steps:
  deps:
    kind: shell
    script: |
      pip install requests
      python run.py
"#,
        );

        let compilation = Compiler::default().compile(&wf).unwrap();
        assert_eq!(compilation.suggestions.len(), 1);
        assert!(!compilation.suggestions[0].applied);
        assert_eq!(
            compilation.manifest.step("deps").unwrap().executor.kind(),
            "shell"
        );
    }

    #[test]
    fn test_discovery_catalog_annotates_suggestions() {
        use crate::runtime::discovery::{IntegrationInfo, RunnerInfo, RunnerStatus};

        let wf = workflow(
            r#"
name: advisory
steps:
  notify:
    kind: agent
    agent: ops
    message: "deploy finished"
    tools:
      - name: chat_post
        integration: chat
      - name: page_oncall
        integration: pager
"#,
        );

        let catalog = DiscoveryCatalog {
            runners: vec![RunnerInfo {
                id: "r1".to_string(),
                status: RunnerStatus::Offline,
                capabilities: vec![],
            }],
            integrations: vec![IntegrationInfo {
                name: "chat".to_string(),
                category: "messaging".to_string(),
                required_secrets: vec!["CHAT_TOKEN".to_string()],
            }],
            secrets: vec![],
        };

        let compiler = Compiler::new(CompileOptions {
            prefer_isolation: false,
            discovery: Some(catalog),
        });
        let compilation = compiler.compile(&wf).unwrap();

        let messages: Vec<&str> = compilation
            .suggestions
            .iter()
            .map(|s| s.message.as_str())
            .collect();
        assert_eq!(messages.len(), 3);
        assert!(messages
            .iter()
            .any(|m| m.contains("no online runners")));
        assert!(messages
            .iter()
            .any(|m| m.contains("unknown integration 'pager'")));
        assert!(messages
            .iter()
            .any(|m| m.contains("requires secret 'CHAT_TOKEN'")));
        // Advisory only; nothing is rewritten.
        assert!(compilation.suggestions.iter().all(|s| !s.applied));
    }

    #[test]
    fn test_isolation_applied_when_preferred() {
        let wf = workflow(
            r#"
name: heavy
steps:
  deps:
    kind: shell
    script: "pip install requests && python run.py"
"#,
        );

        let compiler = Compiler::new(CompileOptions {
            prefer_isolation: true,
            discovery: None,
        });
        let compilation = compiler.compile(&wf).unwrap();
        assert!(compilation.suggestions[0].applied);
        assert_eq!(
            compilation.manifest.step("deps").unwrap().executor.kind(),
            "container"
        );
    }
}
