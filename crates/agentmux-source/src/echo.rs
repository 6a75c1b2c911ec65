//! Echo source.

use agentmux_core::{ExchangeRequest, FragmentSource, FragmentStream, SourceError};
use async_trait::async_trait;

/// Echoes the exchange input back, one word (with its trailing
/// whitespace) per fragment. Concatenating the fragments yields the input.
#[derive(Debug, Clone, Default)]
pub struct EchoSource;

impl EchoSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FragmentSource for EchoSource {
    fn name(&self) -> &str {
        "echo"
    }

    async fn open(&self, request: &ExchangeRequest) -> Result<FragmentStream, SourceError> {
        let fragments: Vec<Result<String, SourceError>> = request
            .input
            .split_inclusive(char::is_whitespace)
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}
