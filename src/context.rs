use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::config::AppConfig;
use crate::llm::{ChatAgent, ChatBackend, ConversationWindow, OpenAIClient};
use crate::tools::{ToolRegistry, default_registry};

/// Everything a front end needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn ChatBackend>,
    pub registry: Arc<ToolRegistry>,
}

impl AppContext {
    pub fn new(config: AppConfig, backend: Arc<dyn ChatBackend>, registry: ToolRegistry) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            registry: Arc::new(registry),
        }
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("no API key configured; backend calls will likely be rejected");
        }
        let client = OpenAIClient::new(
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
        )?;
        let registry = default_registry(&config)?;
        Ok(Self::new(config, Arc::new(client), registry))
    }

    /// An orchestrator over this context's backend and tools.
    pub fn agent(&self, system_prompt: Option<String>) -> ChatAgent {
        ChatAgent::new(
            self.backend.clone(),
            self.registry.clone(),
            ConversationWindow::new(self.config.history_window, system_prompt),
            self.config.max_tool_rounds,
        )
    }
}
