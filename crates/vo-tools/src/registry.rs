use std::sync::Arc;

use tracing::info;

use crate::error::{Result, ToolError};
use crate::tool::{Tool, ToolDefinition};

/// All tools exposed to the LLM for one runtime.
///
/// Assembled once at process start from management tools, scheduler tools,
/// scratch-space tools, and per-source tools. Names must be globally unique.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Duplicate names are a startup error, not a replace.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.iter().any(|t| t.name() == name) {
            return Err(ToolError::DuplicateName { name });
        }
        info!(tool = %name, "registering tool");
        self.tools.push(tool);
        Ok(())
    }

    /// Register many tools at once (startup assembly).
    pub fn register_all(&mut self, tools: Vec<Arc<dyn Tool>>) -> Result<()> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// API-level definitions for the provider request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameter_schema(),
                requires_approval: t.requires_approval(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolContext, ToolResult};
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl Tool for Noop {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn invoke(&self, _args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::success("ok")
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Noop("a"))).unwrap();
        let err = registry.register(Arc::new(Noop("a"))).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_mirror_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Noop("a"))).unwrap();
        registry.register(Arc::new(Noop("b"))).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "a");
        assert!(!defs[0].requires_approval);
    }
}
