use std::sync::Arc;

use async_trait::async_trait;

use vo_channels::Channel;
use vo_core::{EventHandler, EventType};
use vo_tools::Tool;

use crate::error::Result;
use crate::queue::EventQueue;

/// Something that feeds events into the runtime: a chat platform adapter,
/// the REPL, a webhook listener.
///
/// Everything except `start` has a defaulted empty implementation; a
/// minimal source only has to push events. Declared channels, event types,
/// default handlers, and tools are merged into the registries at startup.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Channels this source owns. Registered before the router starts.
    fn channels(&self) -> Vec<Arc<dyn Channel>> {
        Vec::new()
    }

    /// Event types this source can fire.
    fn event_types(&self) -> Vec<EventType> {
        Vec::new()
    }

    /// Default handler rules, merged into the registry at startup.
    fn event_handlers(&self) -> Vec<EventHandler> {
        Vec::new()
    }

    /// Source-specific tools exposed to the LLM.
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    /// Begin ingesting. May spawn tasks that push onto `queue` for the life
    /// of the process; must not block the caller indefinitely.
    async fn start(&self, queue: EventQueue) -> Result<()>;
}
