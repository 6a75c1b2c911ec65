//! agentmux client library
//!
//! Talks to a running `agentmuxd`:
//!
//! 1. **Streaming chat**: over a socket (`/ws/{session}`) or SSE
//!    (`POST /api/chat/stream`), printing fragments as they arrive
//! 2. **Plain requests**: non-streaming chat, health and session listing
//!
//! A connection receives every exchange on its session; [`ExchangeTracker`]
//! picks out the one this client started.

pub mod client;
pub mod error;
pub mod exchange;

pub use client::{ClientConfig, HubClient, DEFAULT_BASE_URL};
pub use error::{ClientError, Result};
pub use exchange::{ExchangeTracker, Transcript};
