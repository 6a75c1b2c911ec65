//! agentmux Core - Shared types for the streaming session multiplexer
//!
//! This crate provides the domain types shared between the daemon
//! (agentmuxd), the fragment sources and the client library.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod ids;
pub mod source;

// Re-exports for convenience
pub use error::{SourceError, SourceResult};
pub use ids::{ConnectionId, MessageId, SessionId};
pub use source::{ExchangeRequest, FragmentSource, FragmentStream, GenerationOptions};
