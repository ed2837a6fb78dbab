use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::stream::{StreamEvent, ToolCallDelta};
use crate::llm::types::{ToolCall, ToolCallFunction};

/// A tool call reassembled from streamed fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub index: usize,
    pub id: Option<String>,
    pub name: String,
    pub arguments: String, // raw JSON string, parsed only after the stream ends
}

impl ToolCallRequest {
    /// The assistant-side record echoed back to the backend. Stream indices are not part of it.
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            kind: "function".to_string(),
            index: None,
            function: ToolCallFunction {
                name: self.name.clone(),
                arguments: self.arguments.clone(),
            },
        }
    }
}

// Buffer to reconstruct tool_calls from streamed deltas
#[derive(Debug, Default)]
pub struct ToolDeltaBuffer {
    // Each index may have an in-progress tool call
    calls: Vec<ToolCallRequest>,
}

impl ToolDeltaBuffer {
    pub fn new() -> Self {
        Self { calls: Vec::new() }
    }

    // Append one delta; indices are expected in non-decreasing order, we resize as needed
    pub fn push_delta(
        &mut self,
        index: usize,
        name_delta: Option<&str>,
        args_delta: Option<&str>,
        id: Option<&str>,
    ) {
        if self.calls.len() <= index {
            let start = self.calls.len();
            self.calls.resize_with(index + 1, Default::default);
            for (i, slot) in self.calls.iter_mut().enumerate().skip(start) {
                slot.index = i;
            }
        }
        let slot = &mut self.calls[index];
        if let Some(idv) = id
            && !idv.is_empty()
            && slot.id.is_none()
        {
            slot.id = Some(idv.to_string());
        }
        if let Some(n) = name_delta {
            slot.name.push_str(n);
        }
        if let Some(a) = args_delta {
            slot.arguments.push_str(a);
        }
    }

    pub fn push(&mut self, delta: &ToolCallDelta) {
        let idx = delta.index.unwrap_or(0);
        let (name_delta, args_delta) = match &delta.function {
            Some(f) => (f.name.as_deref(), f.arguments.as_deref()),
            None => (None, None),
        };
        self.push_delta(idx, name_delta, args_delta, delta.id.as_deref());
    }

    pub fn into_calls(self) -> Vec<ToolCallRequest> {
        self.calls
    }
}

/// Everything one model turn produced once its stream has ended.
#[derive(Debug, Default, PartialEq)]
pub struct CollectedTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Accumulates text and tool-call fragments for a single model turn.
#[derive(Debug, Default)]
pub struct TurnCollector {
    text: String,
    calls: ToolDeltaBuffer,
}

impl TurnCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stream event. Returns the text delta to forward right away, if any.
    pub fn observe(&mut self, event: StreamEvent) -> Option<String> {
        for delta in &event.tool_calls {
            self.calls.push(delta);
        }
        let content = event.content.filter(|c| !c.is_empty())?;
        self.text.push_str(&content);
        Some(content)
    }

    pub fn finish(self) -> CollectedTurn {
        let tool_calls = self.calls.into_calls();
        debug!(target: "llm", text_len = self.text.len(), tool_calls = ?tool_calls, "model turn collected");
        CollectedTurn {
            text: self.text,
            tool_calls,
        }
    }
}
