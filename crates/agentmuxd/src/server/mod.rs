//! HTTP and WebSocket server for the agentmux daemon.
//!
//! The server:
//! - Exposes the SSE adapter (`POST /api/chat/stream`) and the socket
//!   adapter (`GET /ws`, `GET /ws/{session_id}`)
//! - Serves the non-streaming chat endpoint and read-only diagnostics
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    HubServer    │
//! │  (axum Router)  │
//! └───────┬─────────┘
//!         │ per request / per socket
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SSE / Socket    │────▶│  RegistryHandle │
//! │   adapters      │     └────────▲────────┘
//! └───────┬─────────┘              │ broadcast
//!         │ spawn                  │
//!         ▼                        │
//! ┌─────────────────┐              │
//! │  StreamRelay    │──────────────┘
//! │ (per exchange)  │◀── Arc<dyn FragmentSource>
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Request errors become JSON error bodies, socket errors close only
//!   the affected connection

mod api;
mod socket;
mod sse;

pub use api::ApiError;
pub use socket::SocketSession;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use agentmux_core::{ExchangeRequest, FragmentSource, SessionId};
use agentmux_protocol::ChatRequest;

use crate::registry::RegistryHandle;
use crate::relay::StreamRelay;

// ============================================================================
// Shared State
// ============================================================================

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub source: Arc<dyn FragmentSource>,
    /// Cancelled on process shutdown; every relay runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(registry: RegistryHandle, source: Arc<dyn FragmentSource>, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            source,
            shutdown,
        }
    }

    pub fn relay(&self) -> StreamRelay {
        StreamRelay::new(self.registry.clone(), Arc::clone(&self.source))
    }

    /// Validates an HTTP chat body and resolves its session.
    fn exchange_request(&self, request: ChatRequest) -> Result<ExchangeRequest, ApiError> {
        if request.message.trim().is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }
        let session_id = SessionId::resolve(request.session_id.as_deref());
        Ok(ExchangeRequest::new(session_id, request.message).with_options(request.options))
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health))
        .route("/api/chat", post(api::chat))
        .route("/api/chat/stream", post(sse::chat_stream))
        .route("/api/chat/health", get(api::chat_health))
        .route("/api/sessions", get(api::list_sessions))
        .route("/api/sessions/{session_id}", get(api::get_session))
        .route("/ws", get(socket::ws_handler))
        .route("/ws/{session_id}", get(socket::ws_session_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Server
// ============================================================================

/// The daemon's network front end.
pub struct HubServer {
    addr: SocketAddr,
    state: AppState,
}

impl HubServer {
    pub fn new(
        addr: SocketAddr,
        registry: RegistryHandle,
        source: Arc<dyn FragmentSource>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            addr,
            state: AppState::new(registry, source, shutdown),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| ServerError::Bind {
            addr: self.addr,
            error: e.to_string(),
        })?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until the shutdown token fires.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: self.addr,
            error: e.to_string(),
        })?;

        info!(
            addr = %local,
            provider = self.state.source.name(),
            "Hub server listening"
        );

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Server shutdown requested");
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Errors that can occur during server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("server error: {0}")]
    Serve(String),
}
