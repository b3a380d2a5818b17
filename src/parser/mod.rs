// ABOUTME: Parser module for YAML workflow definitions
// ABOUTME: Exports workflow parsing and the step/executor data model

pub mod error;
pub mod step;
pub mod workflow;

pub use error::ParserError;
pub use step::{AttachedFile, ExecutorSpec, HttpMethod, RetryPolicy, StepConfig, ToolDefinition};
pub use workflow::Workflow;
