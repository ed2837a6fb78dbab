//! Wire shapes of the completions endpoint.

use serde_json::{Value as JsonValue, json};

/// One streamed delta, in the backend's own incremental-chunk shape.
pub fn delta_chunk(text: &str) -> String {
    let content = JsonValue::String(text.to_string());
    format!("{{\"choices\":[{{\"delta\":{{\"content\": {content}}}}}]}}")
}

/// The aggregated, non-streaming reply.
pub fn message_body(text: &str) -> JsonValue {
    json!({"choices": [{"message": {"content": text}}]})
}
