//! HTTP front end: an OpenAI-style `POST /v1/chat/completions`.

mod sse;

use std::convert::Infallible;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::llm::{AgentError, AgentEvent, ChatMessage};

pub use sse::{delta_chunk, message_body};

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request_error",
            message: message.into(),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        let kind = match e {
            AgentError::ToolLoopExceeded { .. } => "tool_loop_exceeded",
            AgentError::Backend(_) => "backend_error",
        };
        Self {
            status: StatusCode::BAD_GATEWAY,
            kind,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({"error": {"message": self.message, "type": self.kind}});
        (self.status, Json(body)).into_response()
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(ctx)
}

pub async fn serve(ctx: AppContext, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, tools = ctx.registry.len(), "serving chat completions");
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("http server")?;
    Ok(())
}

async fn chat_completions(
    State(ctx): State<AppContext>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejecting malformed request");
            return ApiError::bad_request(rejection.body_text()).into_response();
        }
    };
    if req.messages.is_empty() {
        return ApiError::bad_request("messages must not be empty").into_response();
    }
    info!(model = %req.model, messages = req.messages.len(), stream = req.stream, "chat completion");

    if req.stream {
        Sse::new(stream_turn(ctx, req)).into_response()
    } else {
        match complete_turn(ctx, req).await {
            Ok(text) => Json(message_body(&text)).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

async fn complete_turn(ctx: AppContext, req: CompletionRequest) -> Result<String, ApiError> {
    let agent = ctx.agent(None);
    let mut history = req.messages;
    let outcome = agent.run_turn(&mut history, &req.model, None).await.map_err(|e| {
        error!(error = %e, "turn failed");
        ApiError::from(e)
    })?;
    debug!(rounds = outcome.rounds, final_len = outcome.text.len(), "turn complete");
    Ok(outcome.transcript)
}

/// Runs the turn on its own task and forwards text deltas as SSE events.
/// A failing turn ends the event stream early.
fn stream_turn(
    ctx: AppContext,
    req: CompletionRequest,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let agent = ctx.agent(None);
    tokio::spawn(async move {
        let mut history = req.messages;
        if let Err(e) = agent.run_turn(&mut history, &req.model, Some(&tx)).await {
            error!(error = %e, "streaming turn failed");
        }
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|ev| (ev, rx)) }).filter_map(
        |ev| async move {
            match ev {
                AgentEvent::Delta(text) => Some(Ok(Event::default().data(delta_chunk(&text)))),
                AgentEvent::ToolDispatched { .. } => None,
            }
        },
    )
}
