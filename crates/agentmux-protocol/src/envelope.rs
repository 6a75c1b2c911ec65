//! The stream envelope.
//!
//! Every exchange is reported to clients as a sequence of envelopes that
//! share one `message_id`:
//!
//! ```text
//! stream_start ─► stream_chunk* ─► stream_end
//!                               └► error
//! ```
//!
//! Exactly one terminal (`stream_end` or `error`) closes the sequence and
//! nothing follows it. The same JSON is used on both transports.

use agentmux_core::{MessageId, SessionId};
use serde::{Deserialize, Serialize};

/// Tagged event envelope, serialized as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Opens an exchange.
    StreamStart {
        message_id: MessageId,
        session_id: SessionId,
    },

    /// One non-empty fragment, in production order.
    StreamChunk {
        message_id: MessageId,
        session_id: SessionId,
        chunk: String,
    },

    /// Normal end of an exchange.
    StreamEnd {
        message_id: MessageId,
        session_id: SessionId,
    },

    /// Failure report.
    ///
    /// Terminates the exchange named by `message_id`. Client-input errors
    /// are not tied to any exchange and carry no `message_id`.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        session_id: SessionId,
        error: String,
    },
}

impl Envelope {
    pub fn start(message_id: MessageId, session_id: SessionId) -> Self {
        Self::StreamStart { message_id, session_id }
    }

    pub fn chunk(message_id: MessageId, session_id: SessionId, chunk: impl Into<String>) -> Self {
        Self::StreamChunk {
            message_id,
            session_id,
            chunk: chunk.into(),
        }
    }

    pub fn end(message_id: MessageId, session_id: SessionId) -> Self {
        Self::StreamEnd { message_id, session_id }
    }

    /// Creates an error that terminates an exchange.
    pub fn failure(message_id: MessageId, session_id: SessionId, error: impl Into<String>) -> Self {
        Self::Error {
            message_id: Some(message_id),
            session_id,
            error: error.into(),
        }
    }

    /// Creates an error describing bad client input.
    pub fn client_error(session_id: SessionId, error: impl Into<String>) -> Self {
        Self::Error {
            message_id: None,
            session_id,
            error: error.into(),
        }
    }

    /// Returns the exchange this envelope belongs to, if any.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::StreamStart { message_id, .. }
            | Self::StreamChunk { message_id, .. }
            | Self::StreamEnd { message_id, .. } => Some(message_id),
            Self::Error { message_id, .. } => message_id.as_ref(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::StreamStart { session_id, .. }
            | Self::StreamChunk { session_id, .. }
            | Self::StreamEnd { session_id, .. }
            | Self::Error { session_id, .. } => session_id,
        }
    }

    /// Returns true for `stream_end` and `error`.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::StreamStart { .. } | Self::StreamChunk { .. } => false,
            Self::StreamEnd { .. } | Self::Error { .. } => true,
        }
    }

    /// Short wire name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StreamStart { .. } => "stream_start",
            Self::StreamChunk { .. } => "stream_chunk",
            Self::StreamEnd { .. } => "stream_end",
            Self::Error { .. } => "error",
        }
    }
}
