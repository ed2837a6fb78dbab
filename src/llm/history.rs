use tracing::debug;

use crate::llm::types::{ChatMessage, Role};

pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Bounded view of a conversation that is sent to the model.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    max_messages: usize,
    system_prompt: Option<String>,
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW, None)
    }
}

impl ConversationWindow {
    pub fn new(max_messages: usize, system_prompt: Option<String>) -> Self {
        Self {
            max_messages,
            system_prompt,
        }
    }

    /// Drop the oldest messages so that at most `max_messages` remain.
    ///
    /// A window that would open on a `tool` message is widened back to the
    /// assistant record that issued the call, so it may exceed `max_messages`.
    /// Tool results with no such record left in the history are dropped.
    pub fn trim(&self, history: &mut Vec<ChatMessage>) {
        let mut start = history.len().saturating_sub(self.max_messages);
        if start < history.len() && history[start].role == Role::Tool {
            match history[..start].iter().rposition(|m| m.role != Role::Tool) {
                Some(owner) if !history[owner].tool_calls.is_empty() => start = owner,
                _ => {
                    while start < history.len() && history[start].role == Role::Tool {
                        start += 1;
                    }
                }
            }
        }
        if start > 0 {
            debug!(dropped = start, kept = history.len() - start, "trimming conversation history");
            history.drain(..start);
        }
    }

    /// Messages to send: the system prompt (if any) followed by `history` as is.
    pub fn request_messages(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut msgs = Vec::with_capacity(history.len() + 1);
        if let Some(sys) = &self.system_prompt {
            msgs.push(ChatMessage::system(sys.clone()));
        }
        msgs.extend_from_slice(history);
        msgs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ToolCall, ToolCallFunction};

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: Some(id.into()),
            kind: "function".into(),
            index: Some(0),
            function: ToolCallFunction {
                name: "getCurrentTime".into(),
                arguments: "{}".into(),
            },
        }
    }

    #[test]
    fn keeps_exactly_the_last_ten_in_order() {
        let mut history: Vec<ChatMessage> = (0..25)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("m{i}"))
                } else {
                    ChatMessage::assistant(format!("m{i}"))
                }
            })
            .collect();
        ConversationWindow::default().trim(&mut history);
        assert_eq!(history.len(), 10);
        let contents: Vec<_> = history
            .iter()
            .map(|m| m.as_text().unwrap_or_default().to_string())
            .collect();
        let expected: Vec<_> = (15..25).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn short_history_is_untouched() {
        let mut history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        ConversationWindow::default().trim(&mut history);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn widens_back_to_the_tool_call_record() {
        let mut history = vec![
            ChatMessage::user("u1"),
            ChatMessage::assistant_tool_calls(vec![call("a"), call("b")]),
            ChatMessage::tool(Some("a".into()), "r1"),
            ChatMessage::tool(Some("b".into()), "r2"),
            ChatMessage::assistant("done"),
            ChatMessage::user("u2"),
        ];
        // A window of 4 would start at the first tool result.
        ConversationWindow::new(4, None).trim(&mut history);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].tool_calls.len(), 2);
        assert_eq!(history[4].as_text(), Some("u2"));
    }

    #[test]
    fn trailing_tool_results_keep_their_question() {
        let calls: Vec<ToolCall> = (0..10).map(|i| call(&format!("c{i}"))).collect();
        let mut history = vec![
            ChatMessage::user("What is the gold price and the weather?"),
            ChatMessage::assistant_tool_calls(calls),
        ];
        for i in 0..10 {
            history.push(ChatMessage::tool(Some(format!("c{i}")), format!("r{i}")));
        }
        ConversationWindow::default().trim(&mut history);
        assert_eq!(history.len(), 11);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[0].tool_calls.len(), 10);
        assert!(history[1..].iter().all(|m| m.role == Role::Tool));
    }

    #[test]
    fn drops_tool_results_without_a_record() {
        let mut history = vec![
            ChatMessage::tool(Some("a".into()), "r1"),
            ChatMessage::tool(Some("b".into()), "r2"),
            ChatMessage::assistant("done"),
            ChatMessage::user("u2"),
        ];
        ConversationWindow::new(3, None).trim(&mut history);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].as_text(), Some("done"));
        assert!(history.iter().all(|m| m.role != Role::Tool));
    }

    #[test]
    fn keeps_complete_tool_pairs() {
        let mut history = vec![
            ChatMessage::user("u1"),
            ChatMessage::assistant_tool_calls(vec![call("a")]),
            ChatMessage::tool(Some("a".into()), "r1"),
            ChatMessage::assistant("done"),
        ];
        ConversationWindow::new(3, None).trim(&mut history);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].tool_calls.len(), 1);
        assert_eq!(history[1].role, Role::Tool);
    }

    #[test]
    fn system_prompt_is_prefixed_outside_the_window() {
        let w = ConversationWindow::new(2, Some("sys".into()));
        let mut history = vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
        ];
        w.trim(&mut history);
        let msgs = w.request_messages(&history);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].as_text(), Some("b"));
        assert_eq!(msgs[2].as_text(), Some("c"));
    }
}
