//! Tools the model can call, and the registry that advertises them.

mod clock;
pub mod email;
mod error;
pub mod gold;
mod location;
mod registry;
mod weather;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::AppConfig;

pub use clock::GetCurrentTimeTool;
pub use email::{Mailer, SendEmailTool, SmtpMailer};
pub use error::ToolError;
pub use gold::{GetGoldPriceTool, GetHistoryGoldPriceTool, HttpMarketData, MarketData};
pub use location::GetCurrentLocationTool;
pub use registry::ToolRegistry;
pub use weather::GetWeatherTool;

/// Text produced by one successful tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub text: String,
}

impl ToolOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A capability the model can invoke by name.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn input_schema(&self) -> JsonValue;

    async fn call(&self, args: &JsonValue) -> Result<ToolOutput>;
}

/// Returns the string argument `key`, or `default` when absent or not a string.
pub(crate) fn str_arg<'a>(args: &'a JsonValue, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

/// Schema for tools that take no arguments.
pub(crate) fn empty_schema() -> JsonValue {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Builds the registry with every tool this application ships.
pub fn default_registry(cfg: &AppConfig) -> Result<ToolRegistry> {
    let market: Arc<dyn MarketData> = Arc::new(HttpMarketData::new(cfg.market.clone())?);
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(cfg.email.clone()));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GetCurrentTimeTool))?;
    registry.register(Arc::new(GetCurrentLocationTool::new(cfg.location.clone())))?;
    registry.register(Arc::new(GetWeatherTool))?;
    registry.register(Arc::new(GetGoldPriceTool::new(market.clone())))?;
    registry.register(Arc::new(GetHistoryGoldPriceTool::new(market)))?;
    registry.register(Arc::new(SendEmailTool::new(mailer)))?;
    Ok(registry)
}
