//! The Fragment Source seam.
//!
//! A [`FragmentSource`] turns one exchange's input into a lazy, finite,
//! ordered stream of text fragments. Awaiting the next fragment is the
//! only suspension point a relay has on the upstream side, so
//! implementations must never block the runtime thread; synchronous
//! producers go through a blocking bridge instead.
//!
//! ```text
//! ExchangeRequest ──open()──► FragmentStream ──next()──► Ok("frag") ... Err(e) | None
//! ```
//!
//! A stream that yields `Err` is finished: the relay stops pulling after
//! the first error.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::ids::SessionId;

/// Stream of fragments produced for one exchange.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, SourceError>> + Send>>;

/// Optional per-request overrides forwarded to the upstream.
///
/// `None` fields fall back to the source's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Everything a source needs to start one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRequest {
    pub session_id: SessionId,
    pub input: String,
    pub options: GenerationOptions,
}

impl ExchangeRequest {
    /// Creates a request with default generation options.
    pub fn new(session_id: SessionId, input: impl Into<String>) -> Self {
        Self {
            session_id,
            input: input.into(),
            options: GenerationOptions::default(),
        }
    }

    /// Replaces the generation options.
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Producer of incremental text for an exchange.
///
/// One instance is chosen at process start and shared by every relay
/// (`Arc<dyn FragmentSource>`), so implementations hold no per-exchange
/// state outside the returned stream.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Short provider name used in logs and health output.
    fn name(&self) -> &str;

    /// Starts an exchange.
    ///
    /// Errors returned here mean no fragment was produced at all.
    async fn open(&self, request: &ExchangeRequest) -> Result<FragmentStream, SourceError>;
}
