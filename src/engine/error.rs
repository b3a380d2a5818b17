// ABOUTME: Error taxonomy for step execution failures
// ABOUTME: Distinguishes interpolation, runtime, timeout, and cancellation causes

use std::time::Duration;
use thiserror::Error;

use crate::interp::InterpError;

/// Why a step attempt (or the step itself) failed. Recorded on the step
/// result rather than propagated; a run always produces an
/// `ExecutionResult`.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Interpolation(#[from] InterpError),

    #[error("execution failed: {message}")]
    StepExecution { message: String },

    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("cancelled by request")]
    Cancelled,
}

impl ExecutionError {
    /// Only runtime faults and timeouts consume retry attempts;
    /// interpolation failures are deterministic and cancellation is
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::StepExecution { .. } | ExecutionError::Timeout { .. }
        )
    }
}
