// ABOUTME: HTTP-backed implementation of the runtime backend trait
// ABOUTME: Submits invocations and polls the event feed over a REST surface

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use super::event::{StepEvent, Submission};
use super::{Result, RuntimeBackend, RuntimeError};
use crate::compiler::ManifestStep;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Runtime backend speaking the execution service's REST surface:
/// `POST /invocations`, `GET /invocations/{id}/events?after={seq}`,
/// `POST /invocations/{id}/cancel`.
#[derive(Debug, Clone)]
pub struct RemoteRuntime {
    base_url: Url,
    client: reqwest::Client,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    seq: u64,
    #[serde(flatten)]
    event: StepEvent,
}

impl RemoteRuntime {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RuntimeError::Protocol(format!("invalid endpoint path '{}': {}", path, e)))
    }

    async fn fetch_events(&self, invocation_id: &str, after: u64) -> Result<Vec<WireEvent>> {
        let url = self.endpoint(&format!("invocations/{}/events", invocation_id))?;
        let response = self
            .client
            .get(url)
            .query(&[("after", after)])
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RuntimeError::UnknownInvocation(invocation_id.to_string()));
        }

        response
            .error_for_status()
            .map_err(|e| RuntimeError::Transport(e.to_string()))?
            .json::<Vec<WireEvent>>()
            .await
            .map_err(|e| RuntimeError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl RuntimeBackend for RemoteRuntime {
    async fn submit(&self, step: &ManifestStep, payload: JsonValue) -> Result<Submission> {
        let url = self.endpoint("invocations")?;
        let body = json!({
            "step": step.name,
            "timeout_secs": step.timeout.as_secs(),
            "payload": payload,
        });

        debug!(step = %step.name, "submitting invocation");
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        response
            .json::<Submission>()
            .await
            .map_err(|e| RuntimeError::Protocol(e.to_string()))
    }

    async fn open_events(&self, invocation_id: &str) -> Result<mpsc::Receiver<StepEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runtime = self.clone();
        let invocation = invocation_id.to_string();

        tokio::spawn(async move {
            let mut after = 0u64;
            loop {
                let batch = match runtime.fetch_events(&invocation, after).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!(invocation = %invocation, error = %e, "event poll failed");
                        break;
                    }
                };

                for wire in batch {
                    after = after.max(wire.seq);
                    let terminal = wire.event.is_terminal();
                    if tx.send(wire.event).await.is_err() {
                        // Consumer went away (timeout or cancellation).
                        return;
                    }
                    if terminal {
                        return;
                    }
                }

                tokio::time::sleep(runtime.poll_interval).await;
            }
        });

        Ok(rx)
    }

    async fn cancel(&self, invocation_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("invocations/{}/cancel", invocation_id))?;
        self.client
            .post(url)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;
        Ok(())
    }
}
