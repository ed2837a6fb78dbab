use std::pin::Pin;

use anyhow::Result;
use futures::Stream;

use crate::llm::stream::StreamEvent;
use crate::llm::types::{ChatMessage, ToolDef};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A model backend that answers a chat request with a stream of incremental events.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<EventStream>;
}
