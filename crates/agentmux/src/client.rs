//! HTTP and WebSocket client for the agentmux daemon.
//!
//! [`HubClient`] offers the daemon's surfaces as plain async calls:
//! - streaming chat over a socket ([`HubClient::chat_ws`])
//! - streaming chat over SSE ([`HubClient::chat_sse`])
//! - non-streaming chat, health and session diagnostics
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in this module.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use agentmux_protocol::{
    decode_server_frame, encode_client_frame, ChatRequest, ChatResponse, ClientFrame, ControlFrame, ServerFrame,
    SessionSummary,
};

use crate::error::{ClientError, Result};
use crate::exchange::{ExchangeTracker, Transcript};

// ============================================================================
// Configuration
// ============================================================================

/// Default daemon address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Configuration for the daemon client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base URL of the daemon; the socket URL is derived from it.
    pub base_url: String,

    /// Timeout for non-streaming requests.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `http://` becomes `ws://`, `https://` becomes `wss://`.
    pub fn ws_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}{path}")
    }
}

// ============================================================================
// Hub Client
// ============================================================================

/// Client for one agentmux daemon.
#[derive(Debug, Clone)]
pub struct HubClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl HubClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.config.http_url("/health"))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// `GET /api/sessions`
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let response = self
            .http
            .get(self.config.http_url("/api/sessions"))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// `POST /api/chat`, waiting for the whole reply.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .http
            .post(self.config.http_url("/api/chat"))
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Streams one exchange over `POST /api/chat/stream`.
    ///
    /// `on_chunk` sees every fragment as it arrives.
    pub async fn chat_sse<F>(&self, request: &ChatRequest, mut on_chunk: F) -> Result<Transcript>
    where
        F: FnMut(&str),
    {
        let response = self
            .http
            .post(self.config.http_url("/api/chat/stream"))
            .json(request)
            .send()
            .await?;
        let mut events = Box::pin(check(response).await?.bytes_stream().eventsource());
        let mut tracker = ExchangeTracker::new();

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ClientError::Protocol(e.to_string()))?;
            if event.data.trim().is_empty() {
                continue;
            }
            let frame = decode_server_frame(&event.data).map_err(|e| ClientError::Protocol(e.to_string()))?;
            if let Some(envelope) = frame.as_envelope() {
                if let Some(transcript) = tracker.accept(envelope, &mut on_chunk)? {
                    return Ok(transcript);
                }
            }
        }
        Err(ClientError::Closed)
    }

    /// Streams one exchange over a socket on `session_id` (or a fresh one).
    pub async fn chat_ws<F>(&self, session_id: Option<&str>, frame: &ClientFrame, mut on_chunk: F) -> Result<Transcript>
    where
        F: FnMut(&str),
    {
        let path = match session_id {
            Some(id) => format!("/ws/{id}"),
            None => "/ws".to_string(),
        };
        let (mut socket, _) = connect_async(self.config.ws_url(&path)).await?;

        let text = encode_client_frame(frame).map_err(|e| ClientError::Protocol(e.to_string()))?;
        socket.send(Message::text(text)).await?;

        let mut tracker = ExchangeTracker::new();
        let result = loop {
            let Some(msg) = socket.next().await else {
                break Err(ClientError::Closed);
            };
            let text = match msg? {
                Message::Text(text) => text,
                Message::Close(_) => break Err(ClientError::Closed),
                _ => continue,
            };

            match decode_server_frame(text.as_str()).map_err(|e| ClientError::Protocol(e.to_string()))? {
                ServerFrame::Control(ControlFrame::System {
                    session_id,
                    connection_id,
                    ..
                }) => {
                    debug!(session_id = %session_id, connection_id = %connection_id, "Socket connected");
                }
                ServerFrame::Control(ControlFrame::Pong { .. }) => {}
                ServerFrame::Envelope(envelope) => match tracker.accept(&envelope, &mut on_chunk) {
                    Ok(Some(transcript)) => break Ok(transcript),
                    Ok(None) => {}
                    Err(e) => break Err(e),
                },
            }
        };

        let _ = socket.close(None).await;
        result
    }
}

/// Turns a non-success response into [`ClientError::Http`] with the
/// daemon's `error` message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text);
    Err(ClientError::Http {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let config = ClientConfig::new("http://localhost:8000/");
        assert_eq!(config.http_url("/health"), "http://localhost:8000/health");
        assert_eq!(config.ws_url("/ws/a"), "ws://localhost:8000/ws/a");

        let secure = ClientConfig::new("https://hub.example.com");
        assert_eq!(secure.ws_url("/ws"), "wss://hub.example.com/ws");
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
