use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use futures::stream;

use crate::llm::backend::{ChatBackend, EventStream};
use crate::llm::stream::StreamEvent;
use crate::llm::types::{ChatMessage, ToolDef};

/// In-process backend that replays one scripted event list per model call.
#[derive(Default)]
pub struct ScriptedBackend {
    rounds: Mutex<VecDeque<Vec<StreamEvent>>>,
    repeat_last: Option<Vec<StreamEvent>>,
    fail_after: Option<usize>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    advertised: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(rounds: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            ..Default::default()
        }
    }

    /// Answers every call with the same events.
    pub fn repeating(events: Vec<StreamEvent>) -> Self {
        Self {
            repeat_last: Some(events),
            ..Default::default()
        }
    }

    /// Streams the first `n` events of the first round, then yields an error.
    pub fn failing_after(events: Vec<StreamEvent>, n: usize) -> Self {
        Self {
            rounds: Mutex::new(vec![events].into()),
            fail_after: Some(n),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn advertised_tools(&self) -> Vec<String> {
        self.advertised.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat_stream(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<EventStream> {
        self.requests.lock().unwrap().push(messages.to_vec());
        *self.advertised.lock().unwrap() =
            tools.iter().map(|t| t.function.name.clone()).collect();

        let events = match self.rounds.lock().unwrap().pop_front() {
            Some(events) => events,
            None => self
                .repeat_last
                .clone()
                .ok_or_else(|| anyhow!("scripted backend has no more rounds"))?,
        };
        let mut items: Vec<Result<StreamEvent>> = events.into_iter().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(anyhow!("connection reset mid-stream")));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
