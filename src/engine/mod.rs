// ABOUTME: Execution engine for compiled manifests
// ABOUTME: Orchestrates waves, aggregates results, and tracks shared run state

pub mod aggregator;
pub mod context;
pub mod error;
pub mod result;
pub mod scheduler;

pub use aggregator::ResultAggregator;
pub use context::ExecutionContext;
pub use error::ExecutionError;
pub use result::{
    AnalysisReport, ExecutionResult, Finding, OutputValue, RunEvent, RunStatus, Severity,
    StepResult, StepStatus,
};
pub use scheduler::Orchestrator;
