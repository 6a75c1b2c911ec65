//! Envelope codec for both transports.
//!
//! Encoding is pure and stateless:
//!
//! - SSE: one event per frame, `data: <json>` followed by a blank line
//! - Socket: one text frame per envelope, the envelope JSON itself
//!
//! Inbound socket text is decoded into a [`ClientFrame`]; every way it can
//! be malformed maps onto a [`FrameError`] that is reported back to the
//! sender as a client-input error.
//!
//! [`SseDecoder`] is the client-side counterpart of [`sse_frame`]. It
//! buffers partial lines across network reads.

use serde_json::Value;
use thiserror::Error;

use crate::message::{ClientFrame, ServerFrame};

/// Maximum inbound frame size (1MB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors produced while decoding or encoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid message format: {0}")]
    InvalidJson(String),

    #[error("message has no \"type\" field")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid {kind} message: {reason}")]
    MissingField { kind: String, reason: String },

    #[error("chat message is empty")]
    EmptyMessage,

    #[error("message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("binary frames are not supported")]
    Binary,

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

const CLIENT_FRAME_TYPES: &[&str] = &["chat", "user_input", "ping"];

/// Decodes one inbound socket text frame.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, FrameError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let value: Value = serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)?
        .to_string();

    if !CLIENT_FRAME_TYPES.contains(&kind.as_str()) {
        return Err(FrameError::UnknownType(kind));
    }

    let frame: ClientFrame = serde_json::from_value(value).map_err(|e| FrameError::MissingField {
        kind: kind.clone(),
        reason: e.to_string(),
    })?;

    if let ClientFrame::Chat { message, .. } = &frame {
        if message.trim().is_empty() {
            return Err(FrameError::EmptyMessage);
        }
    }

    Ok(frame)
}

/// Encodes a client frame as socket text.
pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, FrameError> {
    serde_json::to_string(frame).map_err(|e| FrameError::Encode(e.to_string()))
}

/// Encodes a server frame as socket text.
pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, FrameError> {
    serde_json::to_string(frame).map_err(|e| FrameError::Encode(e.to_string()))
}

/// Decodes one server frame from JSON text (socket frame or SSE data).
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, FrameError> {
    serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))
}

/// Encodes a server frame as one SSE event.
pub fn sse_frame(frame: &ServerFrame) -> Result<String, FrameError> {
    Ok(format!("data: {}\n\n", encode_server_frame(frame)?))
}

/// Incremental SSE parser.
///
/// Collects `data:` lines until a blank line ends the event, then yields
/// the joined payload. Comment lines and other fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns the payloads of all completed events.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }
        events
    }
}
