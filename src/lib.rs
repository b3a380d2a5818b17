// ABOUTME: Main library module for the flotilla workflow orchestrator
// ABOUTME: Exports the compiler, interpolation, runtime, and engine modules

pub mod api;
pub mod compiler;
pub mod engine;
pub mod interp;
pub mod parser;
pub mod runtime;

// Re-export commonly used types
pub use api::{compile, compile_with, execute, execute_streaming, Compilation, ExecuteOptions, RunEvent};
pub use compiler::{CompileError, CompileOptions, Compiler, Manifest};
pub use engine::{ExecutionResult, Orchestrator, RunStatus, StepStatus};
pub use parser::{ExecutorSpec, StepConfig, Workflow};
pub use runtime::{RuntimeBackend, StepEvent};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
