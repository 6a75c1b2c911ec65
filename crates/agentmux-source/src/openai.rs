//! OpenAI-compatible streaming chat completions.
//!
//! Sends `POST {base_url}/chat/completions` with `stream: true` and turns
//! the SSE response into fragments:
//!
//! - each `data:` event is a chat completion chunk, the fragment is
//!   `choices[0].delta.content`
//! - chunks with an empty `choices` list (usage trailers) are skipped
//! - `data: [DONE]` ends the sequence
//! - a non-success HTTP status fails the exchange before any fragment

use agentmux_core::{ExchangeRequest, FragmentSource, FragmentStream, SourceError};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DONE_MARKER: &str = "[DONE]";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts the fragment carried by one `data:` payload.
///
/// Returns `Ok(None)` for chunks that carry no content.
fn parse_chunk(data: &str) -> Result<Option<String>, SourceError> {
    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}

/// Pulls a readable message out of an upstream error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Source
// ============================================================================

/// Streaming client for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSource {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: Option<String>,
}

impl OpenAiSource {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
            system_prompt: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl FragmentSource for OpenAiSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, request: &ExchangeRequest) -> Result<FragmentStream, SourceError> {
        let options = &request.options;
        let model = options.model.as_deref().unwrap_or(&self.model);

        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = self.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.input,
        });

        let body = ChatCompletionRequest {
            model,
            messages,
            stream: true,
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
        };

        debug!(
            provider = %self.name,
            model = %model,
            session_id = %request.session_id,
            "Opening upstream stream"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status = status.as_u16(), "Upstream rejected request");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: error_message(&text),
            });
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(SourceError::Stream(e.to_string()));
                        return;
                    }
                };

                let data = event.data.trim();
                if data == DONE_MARKER {
                    return;
                }
                if data.is_empty() {
                    continue;
                }

                match parse_chunk(data) {
                    Ok(Some(content)) => yield Ok(content),
                    Ok(None) => continue,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
