// ABOUTME: High-level entry points tying parsing, compilation, and execution together
// ABOUTME: Most embedders only ever need compile() plus one of the execute variants

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use crate::compiler::Compilation;
pub use crate::engine::RunEvent;

use crate::compiler::{CompileOptions, Compiler, Manifest};
use crate::engine::{ExecutionResult, Orchestrator};
use crate::parser::Workflow;
use crate::runtime::RuntimeBackend;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Knobs for a single execution run.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Caller-supplied parameter values, overriding workflow defaults.
    pub parameters: HashMap<String, String>,
    /// Upper bound on concurrently dispatched steps.
    pub max_concurrency: usize,
    /// Cancelling this token stops the run after in-flight steps settle.
    pub cancel: CancellationToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            parameters: HashMap::new(),
            max_concurrency: 8,
            cancel: CancellationToken::new(),
        }
    }
}

/// Parse and compile a YAML workflow definition with default options.
pub fn compile(source: &str) -> crate::Result<Compilation> {
    compile_with(source, &CompileOptions::default())
}

/// Parse and compile a YAML workflow definition.
pub fn compile_with(source: &str, options: &CompileOptions) -> crate::Result<Compilation> {
    let workflow = Workflow::from_yaml(source)?;
    debug!(workflow = %workflow.name, steps = workflow.steps.len(), "parsed workflow");
    let compilation = Compiler::new(options.clone()).compile(&workflow)?;
    Ok(compilation)
}

/// Execute a compiled manifest to completion and return the aggregated
/// result. Step failures surface in the result, not as an `Err`.
pub async fn execute(
    manifest: &Manifest,
    backend: Arc<dyn RuntimeBackend>,
    options: ExecuteOptions,
) -> ExecutionResult {
    let orchestrator = Orchestrator::with_max_concurrency(backend, options.max_concurrency);
    orchestrator
        .execute(manifest, &options.parameters, options.cancel)
        .await
}

/// Execute a compiled manifest while streaming progress events. The
/// stream ends with a `Finished` event carrying the full result.
pub fn execute_streaming(
    manifest: Manifest,
    backend: Arc<dyn RuntimeBackend>,
    options: ExecuteOptions,
) -> ReceiverStream<RunEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let orchestrator = Orchestrator::with_max_concurrency(backend, options.max_concurrency);
        orchestrator
            .execute_with_events(&manifest, &options.parameters, options.cancel, Some(tx))
            .await;
    });
    ReceiverStream::new(rx)
}
