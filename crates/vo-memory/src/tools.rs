//! Scratch-space tools; the assistant's own durable key-value notes.
//!
//! Four tools over [`MemoryStore`]: store, search, list, remove. Visibility
//! is scoped automatically from the calling channel; the model never sets
//! visibility tags itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use vo_tools::{Tool, ToolContext, ToolResult};

use crate::store::{MemoryStore, NewEntry};
use crate::types::Priority;

/// Build the scratch tool set over a shared store.
pub fn scratch_tools(store: Arc<MemoryStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(StoreAgentData {
            store: Arc::clone(&store),
        }),
        Arc::new(SearchAgentData {
            store: Arc::clone(&store),
        }),
        Arc::new(ListAgentData {
            store: Arc::clone(&store),
        }),
        Arc::new(RemoveAgentData { store }),
    ]
}

// ---------------------------------------------------------------------------
// store_agent_data
// ---------------------------------------------------------------------------

struct StoreAgentData {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for StoreAgentData {
    fn name(&self) -> &str {
        "store_agent_data"
    }

    fn description(&self) -> &str {
        "Save a note in your persistent scratch space. Use this to remember \
         facts, preferences, or context that should survive across \
         conversations. Notes saved in a private channel stay visible only \
         there. Omit `key` to auto-key the note by its content."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "key": {
                    "type": "string",
                    "description": "Stable identifier; re-using a key overwrites the note."
                },
                "value": {
                    "type": "string",
                    "description": "The note text."
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional labels for later filtering."
                },
                "priority": {
                    "type": "string",
                    "enum": ["high", "medium", "low"],
                    "description": "Retrieval weight; high surfaces first."
                }
            },
            "required": ["value"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(value) = args.get("value").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: value");
        };
        let key = args
            .get("key")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let tags: Vec<String> = args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let priority = args
            .get("priority")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Priority>().ok())
            .unwrap_or_default();

        match self.store.store(NewEntry {
            key,
            value: value.to_string(),
            tags,
            channel_id: ctx.channel_id.clone(),
            channel_is_private: ctx.channel_is_private,
            user_id: ctx.user_id.clone(),
            post_id: ctx.post_id.clone(),
            priority,
        }) {
            Ok(key) => ToolResult::success(format!("Stored under key: {key}")),
            Err(e) => ToolResult::error(format!("store_agent_data failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// search_agent_data
// ---------------------------------------------------------------------------

struct SearchAgentData {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for SearchAgentData {
    fn name(&self) -> &str {
        "search_agent_data"
    }

    fn description(&self) -> &str {
        "Search your scratch space by relevance. Returns up to 5 notes \
         visible from the current channel."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords or a phrase to match against note text."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: query");
        };

        match self.store.search(
            query,
            ctx.channel_id.as_deref(),
            ctx.channel_is_private,
            5,
        ) {
            Ok(hits) if hits.is_empty() => {
                ToolResult::success(format!("No notes found for: {query}"))
            }
            Ok(hits) => {
                let mut out = format!("Found {} note(s):\n", hits.len());
                for (entry, _) in &hits {
                    out.push_str(&format!("- [{}] {}\n", entry.key, entry.value));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("search_agent_data failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// list_agent_data
// ---------------------------------------------------------------------------

struct ListAgentData {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for ListAgentData {
    fn name(&self) -> &str {
        "list_agent_data"
    }

    fn description(&self) -> &str {
        "List every key in your scratch space with a short value preview."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        match self.store.list() {
            Ok(entries) if entries.is_empty() => ToolResult::success("Scratch space is empty."),
            Ok(entries) => {
                let mut out = format!("{} note(s):\n", entries.len());
                for entry in &entries {
                    let preview: String = entry.value.chars().take(80).collect();
                    out.push_str(&format!("- {}: {}\n", entry.key, preview));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("list_agent_data failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// remove_agent_data
// ---------------------------------------------------------------------------

struct RemoveAgentData {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for RemoveAgentData {
    fn name(&self) -> &str {
        "remove_agent_data"
    }

    fn description(&self) -> &str {
        "Delete a note from your scratch space by key."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Key of the note to delete." }
            },
            "required": ["key"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let Some(key) = args.get("key").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: key");
        };
        match self.store.remove(key) {
            Ok(()) => ToolResult::success(format!("Removed: {key}")),
            Err(e) => ToolResult::error(format!("remove_agent_data failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::db::open_db_in_memory;
    use vo_search::SearchIndex;

    fn tools() -> (Arc<MemoryStore>, Vec<Arc<dyn Tool>>) {
        let search = Arc::new(SearchIndex::new(open_db_in_memory().unwrap()).unwrap());
        let store =
            Arc::new(MemoryStore::new(open_db_in_memory().unwrap(), search).unwrap());
        let tools = scratch_tools(Arc::clone(&store));
        (store, tools)
    }

    fn find<'a>(tools: &'a [Arc<dyn Tool>], name: &str) -> &'a Arc<dyn Tool> {
        tools.iter().find(|t| t.name() == name).unwrap()
    }

    #[tokio::test]
    async fn store_scopes_visibility_to_the_calling_channel() {
        let (store, tools) = tools();
        let ctx = ToolContext {
            channel_id: Some("dm-alice".to_string()),
            channel_is_private: true,
            ..ToolContext::default()
        };

        let result = find(&tools, "store_agent_data")
            .invoke(
                serde_json::json!({"key": "k", "value": "alice likes apples"}),
                &ctx,
            )
            .await;
        assert!(!result.is_error);

        // Visible from the home channel, not from elsewhere.
        assert_eq!(
            store.search("apples", Some("dm-alice"), true, 5).unwrap().len(),
            1
        );
        assert!(store.search("apples", Some("dm-bob"), true, 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_reports_missing_keys_as_tool_errors() {
        let (_, tools) = tools();
        let result = find(&tools, "remove_agent_data")
            .invoke(serde_json::json!({"key": "ghost"}), &ToolContext::default())
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("ghost"));
    }
}
