//! Daemon configuration from command-line flags and environment.
//!
//! Every flag has an `AGENTMUX_*` environment fallback so the daemon can
//! be configured without arguments when run from a service manager.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Args;

use agentmux_source::{Provider, SourceConfig};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Network and provider settings for `agentmuxd start`.
#[derive(Args, Debug, Clone)]
pub struct HubConfig {
    /// Address to listen on
    #[arg(long, env = "AGENTMUX_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "AGENTMUX_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Fragment source: echo, openai or qwen
    #[arg(long, env = "AGENTMUX_PROVIDER", default_value_t = Provider::Echo)]
    pub provider: Provider,

    /// Upstream base URL (defaults to the provider's endpoint)
    #[arg(long, env = "AGENTMUX_BASE_URL")]
    pub base_url: Option<String>,

    /// Upstream API key, required for openai and qwen
    #[arg(long, env = "AGENTMUX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Upstream model (defaults to the provider's model)
    #[arg(long, env = "AGENTMUX_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Maximum tokens per reply
    #[arg(long, default_value_t = 1000)]
    pub max_tokens: u32,

    /// System prompt sent ahead of every user message
    #[arg(long)]
    pub system_prompt: Option<String>,
}

impl HubConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            provider: self.provider,
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        hub: HubConfig,
    }

    fn parse(args: &[&str]) -> HubConfig {
        let argv = std::iter::once("agentmuxd").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().hub
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--host", "127.0.0.1", "--port", "8000", "--provider", "echo"]);
        assert_eq!(config.addr(), "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 1000);

        let source = config.source_config();
        assert_eq!(source.provider, Provider::Echo);
        assert!(source.api_key.is_none());
    }

    #[test]
    fn test_provider_flags() {
        let config = parse(&[
            "--provider",
            "qwen",
            "--api-key",
            "sk-test",
            "--model",
            "qwen-plus",
            "--max-tokens",
            "50",
            "--port",
            "9001",
            "--host",
            "0.0.0.0",
        ]);
        assert_eq!(config.addr().port(), 9001);

        let source = config.source_config();
        assert_eq!(source.provider, Provider::Qwen);
        assert_eq!(source.api_key.as_deref(), Some("sk-test"));
        assert_eq!(source.model.as_deref(), Some("qwen-plus"));
        assert_eq!(source.max_tokens, 50);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let argv = ["agentmuxd", "--provider", "llama", "--host", "127.0.0.1", "--port", "1"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
