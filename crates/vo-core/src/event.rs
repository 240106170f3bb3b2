use serde::{Deserialize, Serialize};

/// A named kind of event that handlers can subscribe to.
///
/// Rows are ephemeral; sources and the scheduler repopulate them on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub name: String,
    pub description: String,
}

impl EventType {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A durable rule: when any listed event type fires, evaluate the LLM with
/// `prompt` combined with the event content.
///
/// Output streams to `channel_id` when set, otherwise to the event's own
/// channel. A handler whose channel cannot be resolved is skipped with a
/// warning, never errored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandler {
    pub id: String,
    pub event_type_names: Vec<String>,
    pub prompt: String,
    pub channel_id: Option<String>,
}

impl EventHandler {
    pub fn new(
        id: impl Into<String>,
        event_type_names: Vec<String>,
        prompt: impl Into<String>,
        channel_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type_names,
            prompt: prompt.into(),
            channel_id,
        }
    }
}

/// Compose the turn input from a handler prompt and event content.
///
/// Empty prompt → content alone; empty content → prompt alone; both present →
/// prompt, blank line, `Event content:` header, content.
pub fn compose_turn_input(prompt: &str, content: &str) -> String {
    if prompt.is_empty() {
        content.to_string()
    } else if content.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nEvent content:\n\n{content}")
    }
}
