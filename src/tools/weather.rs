use anyhow::Result;
use serde_json::{Value as JsonValue, json};

use crate::tools::{Tool, ToolOutput, str_arg};

const DEFAULT_LOCATION: &str = "Shanghai";

/// Canned forecast; there is no live weather source behind it.
pub struct GetWeatherTool;

#[async_trait::async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "getWeather"
    }

    fn description(&self) -> &str {
        "Get the weather for a location."
    }

    fn input_schema(&self) -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "Location to get the weather for"}
            },
            "required": ["location"]
        })
    }

    async fn call(&self, args: &JsonValue) -> Result<ToolOutput> {
        let location = str_arg(args, "location", DEFAULT_LOCATION);
        Ok(ToolOutput::new(format!("{location}: 7℃-15℃, sunny")))
    }
}
