use anyhow::{Context, Result, anyhow, bail};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::backend::{ChatBackend, EventStream};
use crate::llm::client_core::OpenAIClient;
use crate::llm::classify_error;
use crate::llm::types::{ChatMessage, ChatRequest, ToolDef};

// Stream types
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamChoiceDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    // OpenAI-compatible tool_calls (streamed as incremental deltas)
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>, // "function"
    #[serde(default)]
    pub function: Option<ToolCallFunctionDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCallFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>, // streamed as partial JSON string
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub delta: StreamChoiceDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// One incremental event of a model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamEvent {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
}

impl StreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            content: Some(delta.into()),
            tool_calls: vec![],
        }
    }

    pub fn tool_call(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCallDelta {
                index: Some(index),
                id: id.map(str::to_string),
                kind: Some("function".into()),
                function: Some(ToolCallFunctionDelta {
                    name: name.map(str::to_string),
                    arguments: arguments.map(str::to_string),
                }),
            }],
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum LineOutcome {
    Skip,
    Done,
    Event(StreamEvent),
}

/// Decode one line of an SSE (or JSONL) chat-completions stream.
pub(crate) fn decode_line(line: &str) -> Result<LineOutcome> {
    let s = line.trim();
    if s.is_empty() || s.starts_with(':') {
        return Ok(LineOutcome::Skip);
    }
    let payload = if let Some(rest) = s.strip_prefix("data:") {
        rest.trim()
    } else if s.starts_with('{') {
        s
    } else {
        // event:, id:, retry: fields carry nothing we use
        return Ok(LineOutcome::Skip);
    };
    if payload == "[DONE]" {
        return Ok(LineOutcome::Done);
    }

    debug!(response_chunk=%payload, "llm chat_stream response");

    let chunk: ChatStreamChunk = serde_json::from_str(payload)
        .with_context(|| format!("malformed stream chunk: {payload}"))?;
    if let Some(err) = chunk.error {
        bail!("backend stream error: {err}");
    }
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(LineOutcome::Skip);
    };
    let event = StreamEvent {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        tool_calls: choice.delta.tool_calls.unwrap_or_default(),
    };
    if event.content.is_none() && event.tool_calls.is_empty() {
        return Ok(LineOutcome::Skip);
    }
    Ok(LineOutcome::Event(event))
}

#[async_trait::async_trait]
impl ChatBackend for OpenAIClient {
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<EventStream> {
        let url = self.endpoint();
        let req = ChatRequest {
            model,
            messages,
            tools,
            stream: true,
        };

        if let Ok(payload) = serde_json::to_string_pretty(&req) {
            debug!(payload=%payload, endpoint=%url, "sending chat.completions payload (stream)");
        }

        let resp = match self
            .inner
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let err = anyhow::Error::new(e);
                let kind = classify_error(None, &err);
                warn!(?kind, err=%err, "chat stream request failed");
                return Err(err.context("send chat request (stream)"));
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let err = anyhow!("chat error: {} - {}", status, text);
            let kind = classify_error(Some(status), &err);
            warn!(?kind, status=%status.as_u16(), "chat stream rejected by backend");
            return Err(err);
        }

        let mut byte_stream = resp.bytes_stream();
        let mut buf = Vec::<u8>::new();

        let stream = async_stream::try_stream! {
            let mut done = false;
            while !done {
                let chunk = match byte_stream.next().await {
                    Some(chunk) => chunk.context("byte stream read error")?,
                    None => break,
                };
                buf.extend_from_slice(&chunk);
                let mut start = 0usize;
                for i in 0..buf.len() {
                    if buf[i] != b'\n' {
                        continue;
                    }
                    let line = std::str::from_utf8(&buf[start..i])
                        .context("stream line is not utf-8")?
                        .to_string();
                    start = i + 1;
                    match decode_line(&line)? {
                        LineOutcome::Skip => {}
                        LineOutcome::Done => {
                            done = true;
                            break;
                        }
                        LineOutcome::Event(event) => yield event,
                    }
                }
                if start > 0 {
                    buf.drain(0..start);
                }
            }
            // A final line without a trailing newline.
            if !done && !buf.is_empty() {
                let line = std::str::from_utf8(&buf)
                    .context("stream line is not utf-8")?
                    .to_string();
                if let LineOutcome::Event(event) = decode_line(&line)? {
                    yield event;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
