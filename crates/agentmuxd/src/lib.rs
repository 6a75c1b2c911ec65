//! agentmux Daemon - Session registry, stream relay and streaming server
//!
//! This crate provides the core infrastructure for the agentmux daemon:
//! - `registry` - Connection registry actor mapping sessions to live connections
//! - `relay` - Per-exchange coordinator between a fragment source and a session
//! - `server` - HTTP server with the SSE and WebSocket adapters
//! - `config` - Command-line and environment configuration
//! - `monitor` - Process monitoring for CPU/memory and registry counts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      agentmuxd daemon                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   HubServer     │────▶│      RegistryActor          │   │
//! │  │ (axum: SSE, ws) │     │ (session → connections)     │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │                             │                   │
//! │           │ one per exchange            │ broadcast         │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ FragmentSource  │────▶│       StreamRelay           │   │
//! │  │ (echo/upstream) │     │  (start, chunks, end/error) │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod monitor;
pub mod registry;
pub mod relay;
pub mod server;
