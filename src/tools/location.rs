use anyhow::Result;
use serde_json::Value as JsonValue;

use crate::tools::{Tool, ToolOutput, empty_schema};

// Fixed label; no geolocation lookup.
pub struct GetCurrentLocationTool {
    label: String,
}

impl GetCurrentLocationTool {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GetCurrentLocationTool {
    fn name(&self) -> &str {
        "getCurrentLocation"
    }

    fn description(&self) -> &str {
        "Get the user's current location."
    }

    fn input_schema(&self) -> JsonValue {
        empty_schema()
    }

    async fn call(&self, _args: &JsonValue) -> Result<ToolOutput> {
        Ok(ToolOutput::new(self.label.clone()))
    }
}
