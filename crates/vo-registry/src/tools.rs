//! Management tools; the LLM's own window onto the routing tables.
//!
//! Registration failures (unknown event type, unknown channel) come back as
//! user-visible strings the model can relay, never as errors that kill the
//! turn.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use vo_core::EventHandler;
use vo_tools::{Tool, ToolContext, ToolResult};

use crate::registry::HandlerRegistry;

/// Build the management tool set over a shared registry.
pub fn management_tools(registry: Arc<HandlerRegistry>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListChannels {
            registry: Arc::clone(&registry),
        }),
        Arc::new(ListEventTypes {
            registry: Arc::clone(&registry),
        }),
        Arc::new(ListEventHandlers {
            registry: Arc::clone(&registry),
        }),
        Arc::new(AddEventHandler {
            registry: Arc::clone(&registry),
        }),
        Arc::new(RemoveEventHandler { registry }),
    ]
}

// ---------------------------------------------------------------------------
// list_channels
// ---------------------------------------------------------------------------

struct ListChannels {
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Tool for ListChannels {
    fn name(&self) -> &str {
        "list_channels"
    }

    fn description(&self) -> &str {
        "List every channel the assistant can deliver to, with its type and \
         group/private flags."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        match self.registry.list_channels() {
            Ok(channels) if channels.is_empty() => {
                ToolResult::success("No channels registered.")
            }
            Ok(channels) => {
                let mut out = String::new();
                for ch in &channels {
                    out.push_str(&format!(
                        "- {} ({}{}{})\n",
                        ch.id,
                        ch.type_name,
                        if ch.is_group { ", group" } else { "" },
                        if ch.is_private { ", private" } else { "" },
                    ));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("list_channels failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// list_event_types
// ---------------------------------------------------------------------------

struct ListEventTypes {
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Tool for ListEventTypes {
    fn name(&self) -> &str {
        "list_event_types"
    }

    fn description(&self) -> &str {
        "List every event type handlers can subscribe to."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        match self.registry.list_event_types() {
            Ok(types) if types.is_empty() => ToolResult::success("No event types registered."),
            Ok(types) => {
                let mut out = String::new();
                for t in &types {
                    out.push_str(&format!("- {}: {}\n", t.name, t.description));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("list_event_types failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// list_event_handlers
// ---------------------------------------------------------------------------

struct ListEventHandlers {
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Tool for ListEventHandlers {
    fn name(&self) -> &str {
        "list_event_handlers"
    }

    fn description(&self) -> &str {
        "List the registered event handlers: id, subscribed event types, \
         target channel, and prompt."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        match self.registry.list_handlers() {
            Ok(handlers) if handlers.is_empty() => {
                ToolResult::success("No event handlers registered.")
            }
            Ok(handlers) => {
                let mut out = String::new();
                for h in &handlers {
                    out.push_str(&format!(
                        "- {} [{}] -> {} | prompt: {}\n",
                        h.id,
                        h.event_type_names.join(", "),
                        h.channel_id.as_deref().unwrap_or("(event channel)"),
                        if h.prompt.is_empty() { "(none)" } else { &h.prompt },
                    ));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("list_event_handlers failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// add_event_handler
// ---------------------------------------------------------------------------

struct AddEventHandler {
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Tool for AddEventHandler {
    fn name(&self) -> &str {
        "add_event_handler"
    }

    fn description(&self) -> &str {
        "Register (or replace) an event handler. When any listed event type \
         fires, the prompt is evaluated together with the event content and \
         the output streams to the given channel, or to the event's own \
         channel when none is given."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Handler id; re-using an id replaces that handler."
                },
                "event_types": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Event type names to subscribe to."
                },
                "prompt": {
                    "type": "string",
                    "description": "Instruction evaluated when the handler fires."
                },
                "channel_id": {
                    "type": "string",
                    "description": "Target channel; omit to answer on the event's channel."
                }
            },
            "required": ["id", "event_types"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let Some(id) = args.get("id").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: id");
        };
        let event_types: Vec<String> = args
            .get("event_types")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if event_types.is_empty() {
            return ToolResult::error("event_types must list at least one event type");
        }
        let prompt = args.get("prompt").and_then(|v| v.as_str()).unwrap_or("");
        let channel_id = args
            .get("channel_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let handler = EventHandler::new(id, event_types, prompt, channel_id);
        match self.registry.upsert_handler(&handler) {
            Ok(()) => ToolResult::success(format!("Handler registered: {id}")),
            // Unknown names come back as plain text the model can act on.
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// remove_event_handler
// ---------------------------------------------------------------------------

struct RemoveEventHandler {
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Tool for RemoveEventHandler {
    fn name(&self) -> &str {
        "remove_event_handler"
    }

    fn description(&self) -> &str {
        "Delete an event handler by id."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Handler id to delete." }
            },
            "required": ["id"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let Some(id) = args.get("id").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: id");
        };
        match self.registry.remove_handler(id) {
            Ok(()) => ToolResult::success(format!("Handler removed: {id}")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::db::open_db_in_memory;
    use vo_core::EventType;

    fn setup() -> (Arc<HandlerRegistry>, Vec<Arc<dyn Tool>>) {
        let registry = Arc::new(HandlerRegistry::new(open_db_in_memory().unwrap()).unwrap());
        registry
            .upsert_event_type(&EventType::new("repl_input", "REPL line"))
            .unwrap();
        let tools = management_tools(Arc::clone(&registry));
        (registry, tools)
    }

    fn find<'a>(tools: &'a [Arc<dyn Tool>], name: &str) -> &'a Arc<dyn Tool> {
        tools.iter().find(|t| t.name() == name).unwrap()
    }

    #[tokio::test]
    async fn add_handler_with_unknown_event_type_is_a_string_not_a_crash() {
        let (registry, tools) = setup();
        let result = find(&tools, "add_event_handler")
            .invoke(
                serde_json::json!({"id": "h1", "event_types": ["no_such"]}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("no_such"));
        assert!(registry.list_handlers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_then_list_then_remove() {
        let (_, tools) = setup();
        let ctx = ToolContext::default();

        let added = find(&tools, "add_event_handler")
            .invoke(
                serde_json::json!({
                    "id": "echo",
                    "event_types": ["repl_input"],
                    "prompt": "answer briefly"
                }),
                &ctx,
            )
            .await;
        assert!(!added.is_error, "{}", added.output);

        let listed = find(&tools, "list_event_handlers")
            .invoke(serde_json::json!({}), &ctx)
            .await;
        assert!(listed.output.contains("echo"));
        assert!(listed.output.contains("repl_input"));

        let removed = find(&tools, "remove_event_handler")
            .invoke(serde_json::json!({"id": "echo"}), &ctx)
            .await;
        assert!(!removed.is_error);
    }
}
