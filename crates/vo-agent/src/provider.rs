use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use vo_core::Message;
use vo_tools::ToolDefinition;

use crate::stream::StreamEvent;

/// Transient-failure retry budget for provider calls.
const MAX_ATTEMPTS: u32 = 5;

/// Request to an LLM provider, already normalised to the core message model.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub api_key: String,
}

/// Common interface for all LLM providers.
///
/// One call = one assistant turn. The provider translates its wire protocol
/// into [`StreamEvent`]s pushed through `tx`, in order, ending with
/// `MessageEnd` (or `Error`).
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    async fn stream(
        &self,
        req: &ProviderRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}

/// Pre-flight input filter evaluated in parallel with the stream.
///
/// Returning `false` aborts the turn before any tool call runs; a stream
/// already in flight is closed early and the turn ends with stop reason
/// `error`.
#[async_trait]
pub trait InputGuardrail: Send + Sync {
    async fn allow(&self, input: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Drive a provider stream with transient-failure retries.
///
/// An attempt is only retried while nothing has been forwarded yet; once
/// the first event reaches the consumer the attempt is committed and any
/// failure surfaces as-is. Backoff is linear (200 ms steps).
pub async fn stream_with_retry(
    provider: &dyn AgentProvider,
    req: &ProviderRequest,
    tx: mpsc::Sender<StreamEvent>,
) -> Result<(), ProviderError> {
    let mut last_err: Option<ProviderError> = None;

    for attempt in 0..MAX_ATTEMPTS {
        let (inner_tx, mut inner_rx) = mpsc::channel::<StreamEvent>(64);
        let outer = tx.clone();
        let forwarder = tokio::spawn(async move {
            let mut forwarded = 0usize;
            while let Some(event) = inner_rx.recv().await {
                forwarded += 1;
                if outer.send(event).await.is_err() {
                    break;
                }
            }
            forwarded
        });

        let result = provider.stream(req, inner_tx).await;
        let forwarded = forwarder.await.unwrap_or(0);

        match result {
            Ok(()) => return Ok(()),
            Err(e) if forwarded == 0 && attempt + 1 < MAX_ATTEMPTS => {
                warn!(
                    provider = %provider.name(),
                    attempt,
                    err = %e,
                    "provider stream failed before first event, retrying"
                );
                last_err = Some(e);
                tokio::time::sleep(std::time::Duration::from_millis(
                    200 * (attempt as u64 + 1),
                ))
                .await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("retries exhausted".to_string())))
}
