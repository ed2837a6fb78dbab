use anyhow::Result;
use chrono::Local;
use serde_json::Value as JsonValue;

use crate::tools::{Tool, ToolOutput, empty_schema};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct GetCurrentTimeTool;

#[async_trait::async_trait]
impl Tool for GetCurrentTimeTool {
    fn name(&self) -> &str {
        "getCurrentTime"
    }

    fn description(&self) -> &str {
        "Get the current local date and time."
    }

    fn input_schema(&self) -> JsonValue {
        empty_schema()
    }

    async fn call(&self, _args: &JsonValue) -> Result<ToolOutput> {
        Ok(ToolOutput::new(Local::now().format(TIME_FORMAT).to_string()))
    }
}
