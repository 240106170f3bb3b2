//! Provider selection.
//!
//! Real provider adapters (Anthropic, OpenAI, …) are wired in by the host
//! that embeds this runtime; the CLI itself only knows the offline `echo`
//! provider used for smoke-testing the event plumbing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vo_agent::{AgentProvider, ProviderError, ProviderRequest, StreamEvent};
use vo_core::{Message, StopReason, Usage};

/// Resolve a provider by its configured name.
pub fn provider_for(name: &str) -> anyhow::Result<Arc<dyn AgentProvider>> {
    match name {
        "echo" => Ok(Arc::new(EchoProvider)),
        other => anyhow::bail!(
            "unknown provider '{other}'; set VO_AGENT_PROVIDER to a provider \
             registered with this build (available: echo)"
        ),
    }
}

/// Streams the last user message straight back. No network, no key.
pub struct EchoProvider;

#[async_trait]
impl AgentProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn stream(
        &self,
        req: &ProviderRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User { content } => Some(format!("echo: {content}")),
                _ => None,
            })
            .unwrap_or_else(|| "echo: (no input)".to_string());

        let _ = tx.send(StreamEvent::TurnStart).await;
        let _ = tx.send(StreamEvent::MessageStart { response_id: None }).await;
        let _ = tx.send(StreamEvent::TextDelta { text: reply }).await;
        let _ = tx
            .send(StreamEvent::UsageReport {
                usage: Usage::default(),
            })
            .await;
        let _ = tx
            .send(StreamEvent::MessageEnd {
                stop_reason: StopReason::Stop,
            })
            .await;
        Ok(())
    }
}
