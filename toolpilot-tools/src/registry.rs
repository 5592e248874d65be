//! Tool registry

use super::base::{Tool, ToolResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of available tools
///
/// Built once through [`ToolRegistryBuilder`] and then shared read-only
/// behind an `Arc` by every request.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a registry
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Register a tool; a later tool with the same name replaces the earlier one
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!("Replaced tool registration: {}", name);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool definitions in OpenAI function format, ordered by name
    pub fn list_schemas(&self) -> Vec<Value> {
        self.tools.values().map(|tool| tool.to_schema()).collect()
    }

    /// Tool definitions to hand to the model, or `None` when there are none
    pub fn schemas_for_model(&self) -> Option<Vec<Value>> {
        if self.tools.is_empty() {
            None
        } else {
            Some(self.list_schemas())
        }
    }

    /// Execute a tool by name. Every failure becomes a failed [`ToolResult`].
    pub async fn execute(&self, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            warn!("Model requested unknown tool: {}", name);
            return ToolResult::fail(format!("Unknown tool: {}", name));
        };

        let errors = tool.validate_params(&params);
        if !errors.is_empty() {
            return ToolResult::fail(format!(
                "Invalid parameters for tool '{}': {}",
                name,
                errors.join("; ")
            ));
        }

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                debug!("Tool {} failed: {}", name, e);
                ToolResult::fail(e.to_string())
            }
        }
    }

    /// Render a result as the text of the tool message sent back to the model
    pub fn format(result: &ToolResult) -> String {
        if result.success {
            return result.output.clone();
        }
        let error = result.error.as_deref().unwrap_or("Tool execution failed");
        format!("Error: {}\n{}", error, result.output)
            .trim()
            .to_string()
    }

    /// Get list of registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Iterate over registered tools in name order
    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// Get number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Collects tools into a [`ToolRegistry`]
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Add a tool
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Add an already shared tool
    pub fn shared(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add several tools
    pub fn extend(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Freeze into a registry. Later registrations win on name clashes.
    pub fn build(self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register(tool);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Result, ToolError};
    use async_trait::async_trait;
    use serde_json::json;

    struct MockTool {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "A mock tool"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"q": {"type": "string"}},
                "required": ["q"]
            })
        }

        async fn execute(&self, _args: Value) -> Result<ToolResult> {
            Ok(ToolResult::ok(self.reply))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value) -> Result<ToolResult> {
            Err(ToolError::ExecutionFailed("boom".to_string()))
        }
    }

    #[test]
    fn test_builder_last_write_wins() {
        let registry = ToolRegistry::builder()
            .tool(MockTool {
                name: "mock",
                reply: "first",
            })
            .tool(MockTool {
                name: "mock",
                reply: "second",
            })
            .build();
        assert_eq!(registry.len(), 1);
        assert!(registry.has("mock"));

        let result = tokio_test::block_on(registry.execute("mock", json!({"q": "x"})));
        assert_eq!(result.output, "second");
    }

    #[test]
    fn test_empty_registry_sends_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.list_schemas().is_empty());
        assert!(registry.schemas_for_model().is_none());

        let registry = ToolRegistry::builder().tool(FailingTool).build();
        assert_eq!(registry.schemas_for_model().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_missing_required_param_is_failed_result() {
        let registry = ToolRegistry::builder()
            .tool(MockTool {
                name: "mock",
                reply: "r",
            })
            .build();
        let result = registry.execute("mock", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Missing required field: q"));
    }

    #[tokio::test]
    async fn test_tool_error_is_converted() {
        let registry = ToolRegistry::builder().tool(FailingTool).build();
        let result = registry.execute("failing", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Execution failed: boom"));
    }

    #[test]
    fn test_format() {
        assert_eq!(ToolRegistry::format(&ToolResult::ok("X")), "X");
        assert_eq!(
            ToolRegistry::format(&ToolResult::fail("E").with_output("Y")),
            "Error: E\nY"
        );
        assert_eq!(ToolRegistry::format(&ToolResult::fail("E")), "Error: E");
    }
}
