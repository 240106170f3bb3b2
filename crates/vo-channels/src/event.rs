use std::sync::Arc;

use crate::channel::Channel;
use crate::types::ChannelUser;

/// Event type name the REPL source fires for each input line.
pub const REPL_INPUT_EVENT: &str = "repl_input";

/// An event delivered to the router queue.
///
/// `Channel` events know where they came from; `Scheduled` events are
/// synthetic and carry only their event-type name; the handler's configured
/// channel decides where output goes.
#[derive(Clone)]
pub enum Event {
    Channel(ChannelEvent),
    Scheduled(ScheduledEvent),
}

/// An event originating from a live channel. REPL input is a `ChannelEvent`
/// with name [`REPL_INPUT_EVENT`].
#[derive(Clone)]
pub struct ChannelEvent {
    /// Event-type key handlers subscribe to.
    pub name: String,
    /// Text payload, possibly empty.
    pub content: String,
    /// The originating channel; also the default session key.
    pub channel: Arc<dyn Channel>,
    /// Set when the adapter detected a direct ping (platform mention).
    pub mentioned: bool,
    /// Who sent it, when the adapter knows.
    pub user: Option<ChannelUser>,
    /// Platform post id, for scrubbing.
    pub post_id: Option<String>,
}

/// A synthetic event fired by the scheduler.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// Event-type key, `tempus_job:<job name>`.
    pub name: String,
}

impl Event {
    pub fn repl_input(content: impl Into<String>, channel: Arc<dyn Channel>) -> Self {
        Event::Channel(ChannelEvent {
            name: REPL_INPUT_EVENT.to_string(),
            content: content.into(),
            channel,
            mentioned: false,
            user: None,
            post_id: None,
        })
    }

    pub fn scheduled(name: impl Into<String>) -> Self {
        Event::Scheduled(ScheduledEvent { name: name.into() })
    }

    /// Event-type key used for handler lookup.
    pub fn name(&self) -> &str {
        match self {
            Event::Channel(e) => &e.name,
            Event::Scheduled(e) => &e.name,
        }
    }

    /// Text payload. Scheduled events carry none.
    pub fn content(&self) -> &str {
        match self {
            Event::Channel(e) => &e.content,
            Event::Scheduled(_) => "",
        }
    }

    /// Session key for channel events (the channel id). Scheduled events
    /// have none; the router keys the session by handler id instead.
    pub fn session_key(&self) -> Option<String> {
        match self {
            Event::Channel(e) => Some(e.channel.id()),
            Event::Scheduled(_) => None,
        }
    }

    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        match self {
            Event::Channel(e) => Some(Arc::clone(&e.channel)),
            Event::Scheduled(_) => None,
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Channel(e) => f
                .debug_struct("ChannelEvent")
                .field("name", &e.name)
                .field("channel", &e.channel.id())
                .field("content_len", &e.content.len())
                .finish(),
            Event::Scheduled(e) => f
                .debug_struct("ScheduledEvent")
                .field("name", &e.name)
                .finish(),
        }
    }
}
