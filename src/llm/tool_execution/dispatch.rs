use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::llm::stream_tools::ToolCallRequest;
use crate::tools::{ToolError, ToolRegistry};

/// Outcome of one tool invocation, ready to become a `tool` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: Option<String>,
    pub content: String,
}

/// Dispatches reassembled tool calls to the registry. Failures come back as text.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolResult {
        ToolResult {
            tool_call_id: call.id.clone(),
            content: self.invoke_raw(&call.name, &call.arguments).await,
        }
    }

    pub async fn invoke_raw(&self, name: &str, raw_arguments: &str) -> String {
        let tool = match self.registry.get(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %name, "model requested an unregistered tool");
                return format!("Error: {e}");
            }
        };
        let args = parse_arguments(name, raw_arguments);
        debug!(tool = %name, args = %args, "invoking tool");

        match AssertUnwindSafe(tool.call(&args)).catch_unwind().await {
            Ok(Ok(output)) => {
                debug!(tool = %name, result = %output.text, "tool succeeded");
                output.text
            }
            Ok(Err(e)) => {
                error!(tool = %name, error = %format!("{e:#}"), "tool failed");
                format!("Error: {}", ToolError::Failed(format!("{e:#}")))
            }
            Err(_) => {
                error!(tool = %name, "tool panicked");
                format!("Error: {}", ToolError::Failed(format!("{name} panicked")))
            }
        }
    }
}

/// Arguments that are missing, not JSON, or not an object become `{}`.
fn parse_arguments(name: &str, raw: &str) -> JsonValue {
    let empty = || JsonValue::Object(Default::default());
    if raw.trim().is_empty() {
        return empty();
    }
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(v) if v.is_object() => v,
        Ok(v) => {
            let e = ToolError::InvalidArguments(format!("expected an object, got {v}"));
            warn!(tool = %name, error = %e, "using empty arguments");
            empty()
        }
        Err(err) => {
            let e = ToolError::InvalidArguments(err.to_string());
            warn!(tool = %name, error = %e, raw = %raw, "using empty arguments");
            empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{GetWeatherTool, Tool, ToolOutput};
    use anyhow::{Result, anyhow};

    struct FailingTool;

    #[async_trait::async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "getGoldPrice"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn input_schema(&self) -> JsonValue {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: &JsonValue) -> Result<ToolOutput> {
            Err(anyhow!("provider unreachable"))
        }
    }

    struct PanickingTool;

    #[async_trait::async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn input_schema(&self) -> JsonValue {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: &JsonValue) -> Result<ToolOutput> {
            panic!("boom")
        }
    }

    fn invoker() -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetWeatherTool)).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry.register(Arc::new(PanickingTool)).unwrap();
        ToolInvoker::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn parses_arguments_and_echoes_id() {
        let call = ToolCallRequest {
            index: 0,
            id: Some("call_7".into()),
            name: "getWeather".into(),
            arguments: r#"{"location":"Tianjin"}"#.into(),
        };
        let res = invoker().invoke(&call).await;
        assert_eq!(res.tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(res.content, "Tianjin: 7℃-15℃, sunny");
    }

    #[tokio::test]
    async fn malformed_arguments_run_with_defaults() {
        let inv = invoker();
        assert_eq!(
            inv.invoke_raw("getWeather", "{\"location\": \"Tian").await,
            "Shanghai: 7℃-15℃, sunny"
        );
        assert_eq!(inv.invoke_raw("getWeather", "").await, "Shanghai: 7℃-15℃, sunny");
        assert_eq!(inv.invoke_raw("getWeather", "[1]").await, "Shanghai: 7℃-15℃, sunny");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_text() {
        let out = invoker().invoke_raw("getStockPrice", "{}").await;
        assert_eq!(out, "Error: unknown tool: getStockPrice");
    }

    #[tokio::test]
    async fn handler_errors_are_reported_as_text() {
        let out = invoker().invoke_raw("getGoldPrice", "{}").await;
        assert_eq!(out, "Error: tool failed: provider unreachable");
    }

    #[tokio::test]
    async fn handler_panics_are_contained() {
        let out = invoker().invoke_raw("explode", "{}").await;
        assert_eq!(out, "Error: tool failed: explode panicked");
    }
}
