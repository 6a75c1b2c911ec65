//! Provider selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use agentmux_core::{FragmentSource, SourceError};
use tracing::info;

use crate::echo::EchoSource;
use crate::openai::OpenAiSource;

/// System prompt used when none is configured for an upstream provider.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly assistant. Answer the user's questions in natural, fluent language.";

/// Available fragment source providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Local echo, no credentials needed.
    #[default]
    Echo,
    /// OpenAI chat completions.
    OpenAi,
    /// Alibaba Qwen through the DashScope OpenAI-compatible endpoint.
    Qwen,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::OpenAi => "openai",
            Self::Qwen => "qwen",
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Echo => None,
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
        }
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::Echo => None,
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Qwen => Some("qwen-flash"),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "echo" => Ok(Self::Echo),
            "openai" => Ok(Self::OpenAi),
            "qwen" => Ok(Self::Qwen),
            other => Err(format!("unknown provider '{other}' (expected echo, openai or qwen)")),
        }
    }
}

/// Everything needed to construct the process-wide fragment source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub provider: Provider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Echo,
            base_url: None,
            api_key: None,
            model: None,
            temperature: 0.7,
            max_tokens: 1000,
            system_prompt: None,
        }
    }
}

/// Builds the fragment source selected by `config`.
///
/// Fails for upstream providers without an API key, so misconfiguration
/// surfaces at startup instead of on the first exchange.
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn FragmentSource>, SourceError> {
    let provider = config.provider;
    let (Some(default_url), Some(default_model)) = (provider.default_base_url(), provider.default_model())
    else {
        info!(provider = %provider, "Using echo fragment source");
        return Ok(Arc::new(EchoSource::new()));
    };

    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| SourceError::Config(format!("provider '{provider}' requires an API key")))?;

    let base_url = config.base_url.as_deref().unwrap_or(default_url);
    let model = config.model.as_deref().unwrap_or(default_model);
    let system_prompt = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    info!(provider = %provider, base_url = %base_url, model = %model, "Using upstream fragment source");

    let source = OpenAiSource::new(provider.as_str(), base_url, api_key, model)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_system_prompt(Some(system_prompt));
    Ok(Arc::new(source))
}
