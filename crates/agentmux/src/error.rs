//! Error types for the agentmux client.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in this module.

use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Errors returned by [`HubClient`](crate::HubClient).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon could not be reached.
    ///
    /// Usually means `agentmuxd` is not running or listens elsewhere.
    #[error("Failed to connect to daemon: {0}")]
    Connect(String),

    /// The daemon answered with a non-success status.
    #[error("Daemon returned {status}: {body}")]
    Http { status: u16, body: String },

    /// A frame from the daemon could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The exchange ended with an `error` envelope.
    #[error("Exchange failed: {0}")]
    Exchange(String),

    /// The stream ended before the exchange finished.
    #[error("Connection closed before the exchange finished")]
    Closed,

    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Protocol(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::Io(io) => Self::Connect(io.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::Closed,
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let error = ClientError::Http {
            status: 404,
            body: "session not found: x".to_string(),
        };
        assert_eq!(error.to_string(), "Daemon returned 404: session not found: x");
    }

    #[test]
    fn test_parse_error_from_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let error: ClientError = json_error.into();
        assert!(matches!(error, ClientError::Parse(_)));
    }

    #[test]
    fn test_ws_closed_maps_to_closed() {
        let error: ClientError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(error, ClientError::Closed));
    }
}
