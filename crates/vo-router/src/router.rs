use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use vo_agent::{Agent, TurnContent, TurnInput};
use vo_channels::{Channel, ChannelRegistry, Event};
use vo_core::event::compose_turn_input;
use vo_registry::HandlerRegistry;
use vo_sessions::SessionStore;

/// The single consumer of the event queue.
///
/// For each event: look up the subscribed handlers, resolve a channel and a
/// session per handler, and spawn one turn task each. Handler failures are
/// logged and isolated; one failing handler never affects its siblings,
/// and the consumer loop never dies.
pub struct Router {
    rx: mpsc::UnboundedReceiver<Event>,
    registry: Arc<HandlerRegistry>,
    channels: Arc<ChannelRegistry>,
    sessions: Arc<SessionStore>,
    agent: Arc<Agent>,
}

impl Router {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Event>,
        registry: Arc<HandlerRegistry>,
        channels: Arc<ChannelRegistry>,
        sessions: Arc<SessionStore>,
        agent: Arc<Agent>,
    ) -> Self {
        Self {
            rx,
            registry,
            channels,
            sessions,
            agent,
        }
    }

    /// Consume the queue until every producer is gone.
    pub async fn run(mut self) {
        info!("event router started");
        while let Some(event) = self.rx.recv().await {
            self.dispatch(event);
        }
        info!("event router stopped: queue closed");
    }

    /// Fan one event out to its handlers. Dispatch order follows handler
    /// insert order; the spawned turns race.
    fn dispatch(&self, event: Event) {
        let handlers = match self.registry.handlers_for(event.name()) {
            Ok(handlers) => handlers,
            Err(e) => {
                error!(event = event.name(), "handler lookup failed: {e}");
                return;
            }
        };
        if handlers.is_empty() {
            debug!(event = event.name(), "no handlers subscribed");
            return;
        }

        for handler in handlers {
            // Channel resolution: the event's own channel wins; channel-less
            // events fall back to the handler's configured target.
            let channel: Option<Arc<dyn Channel>> = match event.channel() {
                Some(channel) => Some(channel),
                None => handler
                    .channel_id
                    .as_deref()
                    .and_then(|id| self.channels.get(id)),
            };
            let Some(channel) = channel else {
                warn!(
                    handler = %handler.id,
                    event = event.name(),
                    "no channel resolves for handler, skipping"
                );
                continue;
            };

            let input_text = compose_turn_input(&handler.prompt, event.content());
            let session_key = event
                .session_key()
                .unwrap_or_else(|| handler.id.clone());
            let session_id = match self.sessions.resolve(
                &session_key,
                channel.is_group(),
                channel.is_private(),
            ) {
                Ok(session_id) => session_id,
                Err(e) => {
                    error!(handler = %handler.id, "session resolution failed: {e}");
                    continue;
                }
            };

            let (mentioned, user_id, post_id) = match &event {
                Event::Channel(e) => (
                    e.mentioned,
                    // Event-level identity wins; fall back to whoever the
                    // adapter says is current.
                    e.user
                        .as_ref()
                        .map(|u| u.id.clone())
                        .or_else(|| e.channel.current_user().map(|u| u.id)),
                    e.post_id.clone(),
                ),
                Event::Scheduled(_) => (false, None, None),
            };

            let agent = Arc::clone(&self.agent);
            let handler_id = handler.id.clone();
            tokio::spawn(async move {
                let input = TurnInput {
                    content: TurnContent::Text(input_text),
                    trigger_prompt: None,
                    mentioned,
                    user_id,
                    post_id,
                };
                if let Err(e) = agent.evaluate(input, &session_id, channel).await {
                    error!(handler = %handler_id, "handler evaluation failed: {e}");
                }
            });
        }
    }
}
