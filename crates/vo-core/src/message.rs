use serde::{Deserialize, Serialize};

/// Fixed rejection text fed back to the model when a pending tool call is
/// skipped by a plain user input (or explicitly rejected).
pub const TOOL_CALL_REJECTED: &str =
    "User skipped or otherwise chose not to allow this tool call to run. \
     Do not retry it unless the user asks you to.";

/// A single message in a session log. JSON-tagged for stable persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<AgentToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
    },
    ToolResult {
        call_id: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
            response_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>, is_error: bool) -> Self {
        Message::ToolResult {
            call_id: call_id.into(),
            output: output.into(),
            is_error,
        }
    }

    /// Rejection result for a pending call the user chose not to run.
    pub fn rejected_tool_result(call_id: impl Into<String>) -> Self {
        Message::tool_result(call_id, TOOL_CALL_REJECTED, true)
    }

    /// Plain text view used for indexing and relevance queries.
    pub fn text(&self) -> &str {
        match self {
            Message::User { content } => content,
            Message::Assistant { content, .. } => content,
            Message::ToolResult { output, .. } => output,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }
}

/// A tool invocation requested by the model.
///
/// `arguments` is the raw JSON object string exactly as accumulated from the
/// provider stream; parsing against the tool schema happens at execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// A tool call blocked on user approval.
///
/// Persisted in `AgentState.pending_tool_calls` when a turn ends awaiting a
/// decision; the next legal input is a matching tool-result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,
}

impl From<&AgentToolCall> for PendingToolCall {
    fn from(call: &AgentToolCall) -> Self {
        Self {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            approved: None,
            rejected_reason: None,
        }
    }
}

/// Token counters, additive across turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_write: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input + self.output + self.cache_read + self.cache_write
    }

    pub fn add(&mut self, other: &Usage) {
        self.input += other.input;
        self.output += other.output;
        self.cache_read += other.cache_read;
        self.cache_write += other.cache_write;
    }
}

/// Uniform stop-reason classification across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Safety,
    Error,
    Other,
}

impl StopReason {
    /// True when the turn loop must not iterate again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StopReason::ToolCalls)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Stop => "stop",
            StopReason::ToolCalls => "tool_calls",
            StopReason::Length => "length",
            StopReason::ContentFilter => "content_filter",
            StopReason::Safety => "safety",
            StopReason::Error => "error",
            StopReason::Other => "other",
        };
        write!(f, "{s}")
    }
}
