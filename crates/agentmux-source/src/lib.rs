//! agentmux Source - Fragment producers
//!
//! Implementations of [`agentmux_core::FragmentSource`]:
//!
//! | Source | Use |
//! |--------|-----|
//! | [`EchoSource`] | default, echoes the input word by word, needs no credentials |
//! | [`ScriptedSource`] | fixed fragment list with optional failure, delay or stall |
//! | [`BlockingSource`] | bridges a synchronous iterator through a blocking thread |
//! | [`OpenAiSource`] | OpenAI-compatible `/chat/completions` streaming (openai, qwen) |
//!
//! The daemon picks exactly one at startup through [`build_source`].

mod blocking;
mod config;
mod echo;
mod openai;
mod scripted;

pub use blocking::BlockingSource;
pub use config::{build_source, Provider, SourceConfig, DEFAULT_SYSTEM_PROMPT};
pub use echo::EchoSource;
pub use openai::OpenAiSource;
pub use scripted::ScriptedSource;
