//! Upstream failure types following panic-free policy.

use thiserror::Error;

/// Errors a fragment source can report, either when opening an exchange
/// or in place of the next fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source is misconfigured (missing credentials, bad URL).
    #[error("source misconfigured: {0}")]
    Config(String),

    /// The upstream could not be reached.
    #[error("cannot reach upstream: {0}")]
    Connect(String),

    /// The upstream answered with a non-success HTTP status.
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The upstream stream broke mid-sequence.
    #[error("upstream stream interrupted: {0}")]
    Stream(String),

    /// An upstream payload could not be decoded.
    #[error("failed to decode upstream payload: {0}")]
    Decode(String),

    /// Generation failed for a producer-specific reason.
    #[error("{0}")]
    Failed(String),
}

impl SourceError {
    /// Creates a generic failure from any displayable error.
    pub fn failed<E: std::fmt::Display>(err: E) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Result type for fragment source operations.
pub type SourceResult<T> = Result<T, SourceError>;
