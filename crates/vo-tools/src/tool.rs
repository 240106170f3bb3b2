use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text returned to the LLM.
    pub output: String,
    /// Whether the tool execution failed.
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
        }
    }
}

/// Per-invocation context threaded through the call stack; never a
/// process-wide slot. Tools that scope their effects to the calling channel
/// or user read it here.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub channel_id: Option<String>,
    pub channel_is_private: bool,
    pub user_id: Option<String>,
    pub post_id: Option<String>,
}

/// Trait that all tools implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Globally unique name (e.g. `"add_event_handler"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameter_schema(&self) -> serde_json::Value;

    /// When true, execution blocks until the user approves the call.
    fn requires_approval(&self) -> bool {
        false
    }

    /// Execute the tool. Arguments have already been validated against
    /// [`parameter_schema`](Tool::parameter_schema). Failures are reported
    /// through `ToolResult::error`, never by panicking.
    async fn invoke(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult;
}

/// API-level tool definition sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub requires_approval: bool,
}
