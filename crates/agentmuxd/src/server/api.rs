//! Plain JSON endpoints: discovery, health, diagnostics and the
//! non-streaming chat call.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use agentmux_core::{MessageId, SessionId};
use agentmux_protocol::{ChatRequest, ChatResponse, Envelope, SessionSummary};

use super::AppState;
use crate::registry::{ConnectionSink, SINK_CAPACITY};
use crate::relay::RelayOutcome;

// ============================================================================
// Errors
// ============================================================================

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or empty request body.
    #[error("{0}")]
    BadRequest(String),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The upstream failed the exchange.
    #[error("{0}")]
    Upstream(String),

    #[error("server is shutting down")]
    ShuttingDown,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ============================================================================
// Discovery & Health
// ============================================================================

pub(crate) async fn index() -> Json<Value> {
    Json(json!({
        "service": "agentmux",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "chat": "POST /api/chat",
            "chat_stream": "POST /api/chat/stream",
            "chat_health": "GET /api/chat/health",
            "sessions": "GET /api/sessions",
            "session": "GET /api/sessions/{session_id}",
            "websocket": "GET /ws or /ws/{session_id}",
        }
    }))
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "agentmux",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) async fn chat_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chat",
        "provider": state.source.name(),
    }))
}

// ============================================================================
// Diagnostics
// ============================================================================

pub(crate) async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list_sessions().await)
}

pub(crate) async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session_id = SessionId::new(session_id);
    state
        .registry
        .get_session(&session_id)
        .await
        .map(Json)
        .ok_or(ApiError::SessionNotFound(session_id))
}

// ============================================================================
// Non-streaming chat
// ============================================================================

/// Runs one exchange on a private connection and returns the joined chunks.
pub(crate) async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let exchange = state.exchange_request(request)?;
    let session_id = exchange.session_id.clone();
    let message_id = MessageId::generate();

    let (sink, mut rx) = ConnectionSink::channel(SINK_CAPACITY);
    let connection_id = state.registry.register(session_id.clone(), sink).await;

    let relay = state.relay();
    let registry = state.registry.clone();
    let run = async {
        let outcome = relay
            .run_as(message_id.clone(), exchange, state.shutdown.child_token())
            .await;
        registry.unregister(&connection_id, &session_id).await;
        outcome
    };

    // Other exchanges on the same session may be interleaved; keep only ours.
    let collect = async {
        let mut content = String::new();
        while let Some(frame) = rx.recv().await {
            let Some(envelope) = frame.as_envelope() else {
                continue;
            };
            if envelope.message_id() != Some(&message_id) {
                continue;
            }
            match envelope {
                Envelope::StreamChunk { chunk, .. } => content.push_str(chunk),
                Envelope::StreamEnd { .. } | Envelope::Error { .. } => break,
                Envelope::StreamStart { .. } => {}
            }
        }
        content
    };

    let (outcome, content) = tokio::join!(run, collect);

    match outcome {
        RelayOutcome::Completed { message_id, .. } => {
            Ok(Json(ChatResponse::success(message_id, session_id, content)))
        }
        RelayOutcome::Failed { error, .. } => Err(ApiError::Upstream(error)),
        RelayOutcome::Cancelled { .. } => Err(ApiError::ShuttingDown),
    }
}
