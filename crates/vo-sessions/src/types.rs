use serde::{Deserialize, Serialize};
use vo_core::{Message, PendingToolCall, Usage};

/// One row of a session's append-only log.
///
/// Either a normal turn (user input or tool results, then the assistant
/// message) or a compaction entry whose messages supersede everything
/// before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Insertion id, assigned by the database. 0 until persisted.
    #[serde(default)]
    pub id: i64,
    pub session_id: String,
    pub created_at: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub is_compaction: bool,
    #[serde(default)]
    pub pending_tool_calls: Vec<PendingToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl SessionEntry {
    pub fn turn(session_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: 0,
            session_id: session_id.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            messages,
            usage: Usage::default(),
            is_compaction: false,
            pending_tool_calls: Vec::new(),
            user_id: None,
            post_id: None,
        }
    }

    /// A summary entry that replaces the logical history on rebuild.
    pub fn compaction(session_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            is_compaction: true,
            ..Self::turn(session_id, vec![Message::user(summary.into())])
        }
    }

    /// Flattened text extract used for search indexing.
    pub fn text_extract(&self) -> String {
        self.messages
            .iter()
            .map(Message::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Derived, in-memory projection of a session.
///
/// Rebuilt deterministically by folding [`SessionEntry`] rows in insertion
/// order; see [`AgentState::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub messages: Vec<Message>,
    pub response_id: Option<String>,
    pub usage: Usage,
    pub pending_tool_calls: Vec<PendingToolCall>,
}

impl AgentState {
    /// Fold one entry into the state.
    ///
    /// Compaction entries replace the accumulated messages; every entry
    /// overwrites the pending-call set (an empty set clears it).
    pub fn apply(&mut self, entry: &SessionEntry) {
        if entry.is_compaction {
            self.messages = entry.messages.clone();
        } else {
            self.messages.extend(entry.messages.iter().cloned());
        }

        for msg in &entry.messages {
            if let Message::Assistant {
                response_id: Some(id),
                ..
            } = msg
            {
                self.response_id = Some(id.clone());
            }
        }

        self.usage.add(&entry.usage);
        self.pending_tool_calls = entry.pending_tool_calls.clone();
    }

    /// Rebuild from an ordered entry sequence.
    pub fn fold<'a>(entries: impl IntoIterator<Item = &'a SessionEntry>) -> Self {
        let mut state = AgentState::default();
        for entry in entries {
            state.apply(entry);
        }
        state
    }
}
