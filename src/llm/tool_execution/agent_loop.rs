use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::llm::backend::ChatBackend;
use crate::llm::history::ConversationWindow;
use crate::llm::stream_tools::{ToolCallRequest, TurnCollector};
use crate::llm::tool_execution::dispatch::ToolInvoker;
use crate::llm::types::ChatMessage;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool-call loop exceeded {limit} rounds")]
    ToolLoopExceeded { limit: usize },

    #[error("model backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Progress reported while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A text delta, forwarded as soon as it arrives.
    Delta(String),
    /// A tool is about to be invoked.
    ToolDispatched { name: String, arguments: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Text of the final, tool-free model call.
    pub text: String,
    /// Every delta forwarded during the turn, across all model calls.
    pub transcript: String,
    /// Number of model calls made.
    pub rounds: usize,
}

/// Drives model calls and tool dispatch until a model call ends without tool calls.
pub struct ChatAgent {
    backend: Arc<dyn ChatBackend>,
    invoker: ToolInvoker,
    window: ConversationWindow,
    max_tool_rounds: usize,
}

impl ChatAgent {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        registry: Arc<ToolRegistry>,
        window: ConversationWindow,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            backend,
            invoker: ToolInvoker::new(registry),
            window,
            max_tool_rounds,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.invoker.registry()
    }

    /// Runs one user turn against `history`, which must already end with the
    /// caller's new messages. Assistant and tool messages are appended in place.
    pub async fn run_turn(
        &self,
        history: &mut Vec<ChatMessage>,
        model: &str,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        self.window.trim(history);
        let specs = self.invoker.registry().list_specs();
        let mut transcript = String::new();
        let mut tool_rounds = 0usize;
        let mut rounds = 0usize;

        loop {
            rounds += 1;
            let messages = self.window.request_messages(history);
            debug!(round = rounds, messages = messages.len(), "calling model");
            let mut stream = self.backend.chat_stream(model, &messages, &specs).await?;

            let mut collector = TurnCollector::new();
            while let Some(event) = stream.next().await {
                if let Some(delta) = collector.observe(event?) {
                    transcript.push_str(&delta);
                    emit(events, AgentEvent::Delta(delta));
                }
            }
            let turn = collector.finish();

            let calls: Vec<ToolCallRequest> = turn
                .tool_calls
                .into_iter()
                .filter(|c| {
                    if c.name.is_empty() {
                        warn!(index = c.index, "skipping tool call without a name");
                    }
                    !c.name.is_empty()
                })
                .collect();

            if calls.is_empty() {
                if !turn.text.is_empty() {
                    history.push(ChatMessage::assistant(turn.text.clone()));
                }
                info!(rounds, tool_rounds, "turn complete");
                return Ok(TurnOutcome {
                    text: turn.text,
                    transcript,
                    rounds,
                });
            }

            if tool_rounds >= self.max_tool_rounds {
                warn!(limit = self.max_tool_rounds, "model kept requesting tools");
                return Err(AgentError::ToolLoopExceeded {
                    limit: self.max_tool_rounds,
                });
            }
            tool_rounds += 1;

            // one at a time, in the order the model emitted them
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                emit(
                    events,
                    AgentEvent::ToolDispatched {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                );
                results.push(self.invoker.invoke(call).await);
            }

            history.push(ChatMessage::assistant_tool_calls(
                calls.iter().map(ToolCallRequest::to_tool_call).collect(),
            ));
            for res in results {
                history.push(ChatMessage::tool(res.tool_call_id, res.content));
            }
        }
    }
}

fn emit(events: Option<&UnboundedSender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = events {
        // receiver gone means the caller stopped listening; the turn still finishes
        let _ = tx.send(event);
    }
}
