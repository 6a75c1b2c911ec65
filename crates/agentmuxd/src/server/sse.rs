//! Streaming-response (SSE) adapter.
//!
//! One instance per request:
//!
//! 1. resolve the session (body field or generated)
//! 2. register one anonymous connection whose sink feeds the response body
//! 3. spawn exactly one relay
//! 4. unregister once the relay returns
//!
//! The response body owns a drop guard on the relay's token, so a client
//! abort cancels the relay. The body ends after this exchange's terminal
//! envelope or when the connection is unregistered.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error};

use agentmux_core::MessageId;
use agentmux_protocol::{sse_frame, ChatRequest};

use super::{ApiError, AppState};
use crate::registry::{ConnectionSink, SINK_CAPACITY};
use crate::relay::RelayOutcome;

pub(crate) async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let exchange = state.exchange_request(request)?;
    let session_id = exchange.session_id.clone();
    let message_id = MessageId::generate();

    let (sink, mut rx) = ConnectionSink::channel(SINK_CAPACITY);
    let connection_id = state.registry.register(session_id.clone(), sink).await;
    let cancel = state.shutdown.child_token();

    debug!(
        session_id = %session_id,
        connection_id = %connection_id,
        message_id = %message_id,
        "SSE stream opened"
    );

    {
        let relay = state.relay();
        let registry = state.registry.clone();
        let cancel = cancel.clone();
        let message_id = message_id.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            let outcome = relay.run_as(message_id, exchange, cancel).await;
            if let RelayOutcome::Cancelled { message_id, chunks } = &outcome {
                debug!(
                    session_id = %session_id,
                    message_id = %message_id,
                    chunks,
                    "SSE client went away"
                );
            }
            registry.unregister(&connection_id, &session_id).await;
        });
    }

    let guard = cancel.drop_guard();
    let body = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            let last = frame
                .as_envelope()
                .is_some_and(|env| env.is_terminal() && env.message_id() == Some(&message_id));

            match sse_frame(&frame) {
                Ok(text) => yield Ok::<_, Infallible>(text),
                Err(e) => error!(error = %e, "Failed to encode SSE frame"),
            }

            if last {
                break;
            }
        }
    };

    let mut response = (StatusCode::OK, Body::from_stream(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}
