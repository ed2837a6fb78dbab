mod backend;
mod client_core;
mod history;
mod stream;
mod stream_tools;
mod tool_execution;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

use reqwest::StatusCode;

pub use backend::*;
pub use client_core::*;
pub use history::*;
pub use stream::{StreamEvent, ToolCallDelta, ToolCallFunctionDelta};
pub use stream_tools::*;
pub use tool_execution::*;
pub use types::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    Server,
    Network,
    Timeout,
    Client,
    Decode,
    Unknown,
}

pub fn classify_error(status: Option<StatusCode>, err: &anyhow::Error) -> LlmErrorKind {
    if let Some(st) = status {
        if st == StatusCode::TOO_MANY_REQUESTS {
            return LlmErrorKind::RateLimited;
        }
        if st.is_server_error() {
            return LlmErrorKind::Server;
        }
        if st.is_client_error() {
            return LlmErrorKind::Client;
        }
    }
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        if e.is_timeout() {
            return LlmErrorKind::Timeout;
        }
        if e.is_decode() {
            return LlmErrorKind::Decode;
        }
        if e.is_connect() || e.is_body() || e.is_request() {
            return LlmErrorKind::Network;
        }
    }
    LlmErrorKind::Unknown
}
