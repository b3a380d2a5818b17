// ABOUTME: External execution runtime surface consumed by the orchestrator
// ABOUTME: Defines the backend trait, event types, and concrete implementations

pub mod discovery;
pub mod event;
pub mod remote;

pub use discovery::{DiscoveryCatalog, IntegrationInfo, RunnerInfo, RunnerStatus, SecretInfo};
pub use event::{EventKind, FinalStatus, StepEvent, Submission};
pub use remote::RemoteRuntime;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::compiler::ManifestStep;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown invocation: {0}")]
    UnknownInvocation(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// The remote execution backend. The orchestrator treats the executor
/// payload as opaque: it is forwarded as resolved, plain structured data
/// and never interpreted locally.
#[async_trait]
pub trait RuntimeBackend: Send + Sync {
    /// Submit one step for execution with its interpolated payload.
    async fn submit(&self, step: &ManifestStep, payload: JsonValue) -> Result<Submission>;

    /// Open the event channel for an in-flight invocation. The channel
    /// terminates with a `StepEvent` whose kind is `Completed`.
    async fn open_events(&self, invocation_id: &str) -> Result<mpsc::Receiver<StepEvent>>;

    /// Request cooperative cancellation of an invocation. Best-effort;
    /// the runtime may still deliver a terminal event.
    async fn cancel(&self, invocation_id: &str) -> Result<()>;
}
