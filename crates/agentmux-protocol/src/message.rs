//! Socket frames and HTTP bodies.

use agentmux_core::{ConnectionId, GenerationOptions, MessageId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Frames a socket client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Starts a new exchange on the socket's session.
    ///
    /// `user_input` is accepted as a legacy name.
    #[serde(alias = "user_input")]
    Chat {
        message: String,
        #[serde(flatten)]
        options: GenerationOptions,
    },

    /// Liveness check, answered with a pong to this connection only.
    Ping {
        /// Sequence number echoed in the pong
        seq: u64,
    },
}

impl ClientFrame {
    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn ping(seq: u64) -> Self {
        Self::Ping { seq }
    }
}

/// Socket-only frames that are not part of any exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Greeting sent once after accept.
    System {
        message: String,
        session_id: SessionId,
        connection_id: ConnectionId,
    },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },
}

impl ControlFrame {
    pub fn connected(session_id: SessionId, connection_id: ConnectionId) -> Self {
        Self::System {
            message: "connected".to_string(),
            session_id,
            connection_id,
        }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }
}

/// Anything the server writes to a connection.
///
/// Serialized without an extra wrapper, so an envelope frame is exactly
/// the envelope JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Envelope(Envelope),
    Control(ControlFrame),
}

impl ServerFrame {
    /// Returns the envelope, if this frame carries one.
    pub fn as_envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Envelope(env) => Some(env),
            Self::Control(_) => None,
        }
    }
}

impl From<Envelope> for ServerFrame {
    fn from(env: Envelope) -> Self {
        Self::Envelope(env)
    }
}

impl From<ControlFrame> for ServerFrame {
    fn from(frame: ControlFrame) -> Self {
        Self::Control(frame)
    }
}

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub options: GenerationOptions,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Body returned by the non-streaming `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub content: String,
    pub status: String,
}

impl ChatResponse {
    pub fn success(message_id: MessageId, session_id: SessionId, content: String) -> Self {
        Self {
            message_id,
            session_id,
            content,
            status: "success".to_string(),
        }
    }
}

/// Diagnostic view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub connections: Vec<ConnectionId>,
    pub opened_at: DateTime<Utc>,
}
