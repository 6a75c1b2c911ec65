//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors surfaced by diagnostic queries
//! - `RemovalReason`: Why a connection left the registry
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::fmt;
use std::sync::Arc;

use agentmux_core::{ConnectionId, SessionId};
use agentmux_protocol::SessionSummary;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};

use super::sink::ConnectionSink;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each request uses a oneshot channel for the response. The actor never
/// performs delivery itself; it only hands out sinks.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert a connection, creating its session on first use.
    Register {
        connection_id: ConnectionId,
        session_id: SessionId,
        sink: ConnectionSink,
        respond_to: oneshot::Sender<()>,
    },

    /// Remove a connection. Responds with whether it was present.
    Unregister {
        connection_id: ConnectionId,
        session_id: SessionId,
        reason: RemovalReason,
        respond_to: oneshot::Sender<bool>,
    },

    /// Member sinks of a session plus its delivery gate, as of now.
    Snapshot {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<SessionSnapshot>>,
    },

    /// Owning session and sink of one connection.
    GetConnection {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Option<(SessionId, ConnectionSink)>>,
    },

    ListSessions {
        respond_to: oneshot::Sender<Vec<SessionSummary>>,
    },

    GetSession {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<SessionSummary>>,
    },

    Stats {
        respond_to: oneshot::Sender<RegistryStats>,
    },

    /// Drop every connection whose transport is already gone.
    ///
    /// Fire-and-forget, sent by the cleanup task.
    PruneClosed,
}

/// Point-in-time view of one session used by broadcast.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Held for the whole deliver step so broadcasts to one session never
    /// interleave. Other sessions have their own gate.
    pub gate: Arc<Mutex<()>>,
    pub members: Vec<(ConnectionId, ConnectionSink)>,
}

/// Registry size counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub connections: usize,
}

// ============================================================================
// Removal Reasons
// ============================================================================

/// Why a connection was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The transport closed or the adapter finished.
    Closed,
    /// A delivery attempt failed.
    DeliveryFailed,
    /// The cleanup sweep found the transport gone.
    Pruned,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::DeliveryFailed => write!(f, "delivery failed"),
            Self::Pruned => write!(f, "pruned"),
        }
    }
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Closed.to_string(), "closed");
        assert_eq!(RemovalReason::DeliveryFailed.to_string(), "delivery failed");
        assert_eq!(RemovalReason::Pruned.to_string(), "pruned");
    }

    #[test]
    fn test_registry_error_display() {
        assert_eq!(RegistryError::ChannelClosed.to_string(), "response channel closed");
    }
}
