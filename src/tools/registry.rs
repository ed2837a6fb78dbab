use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::llm::types::{ToolDef, ToolFunctionDef};
use crate::tools::{Tool, ToolError};

/// Name-keyed set of tools. Read-only once the application has started.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    // registration order, so the advertised list is stable
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        debug!(tool = %name, "registering tool");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Tool specs in the function-calling shape the backend expects.
    pub fn list_specs(&self) -> Vec<ToolDef> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDef {
                kind: "function".into(),
                function: ToolFunctionDef {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.input_schema(),
                },
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{GetCurrentTimeTool, GetWeatherTool};
    use serde_json::json;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetCurrentTimeTool)).unwrap();
        let err = registry.register(Arc::new(GetCurrentTimeTool)).unwrap_err();
        assert_eq!(err, ToolError::DuplicateTool("getCurrentTime".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_unknown_tool_fails() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        match registry.get("nope") {
            Err(ToolError::UnknownTool(name)) => assert_eq!(name, "nope"),
            other => panic!("unexpected: {:?}", other.map(|t| t.name().to_string())),
        }
    }

    #[test]
    fn specs_use_function_calling_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetWeatherTool)).unwrap();
        let specs = serde_json::to_value(registry.list_specs()).unwrap();
        assert_eq!(specs[0]["type"], "function");
        assert_eq!(specs[0]["function"]["name"], "getWeather");
        assert_eq!(
            specs[0]["function"]["parameters"]["required"],
            json!(["location"])
        );
    }
}
