//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is cheap to clone and is shared by every adapter
//! and relay. Lifecycle operations never fail towards the caller:
//!
//! - `register` always yields a connection id
//! - `unregister` is idempotent
//! - `send` and `broadcast` turn delivery failures into removals
//!
//! Delivery itself runs in the calling task, never in the actor, so a slow
//! connection only holds up broadcasts to its own session.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or logged

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use agentmux_core::{ConnectionId, SessionId};
use agentmux_protocol::{Envelope, ServerFrame, SessionSummary};

use super::commands::{RegistryCommand, RegistryError, RegistryStats, RemovalReason, SessionSnapshot};
use super::sink::ConnectionSink;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
#[derive(Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Sends a request and waits for its response.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Registers a connection under `session_id` and returns its fresh id.
    ///
    /// Never fails. If the actor is gone the id is still returned; every
    /// later operation on it is a no-op.
    pub async fn register(&self, session_id: SessionId, sink: ConnectionSink) -> ConnectionId {
        let connection_id = ConnectionId::generate();
        let result = self
            .request(|respond_to| RegistryCommand::Register {
                connection_id: connection_id.clone(),
                session_id: session_id.clone(),
                sink,
                respond_to,
            })
            .await;

        if let Err(e) = result {
            warn!(
                session_id = %session_id,
                connection_id = %connection_id,
                error = %e,
                "Registry unavailable, connection not tracked"
            );
        }
        connection_id
    }

    /// Removes a connection. Unknown ids are a no-op.
    pub async fn unregister(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        self.remove(connection_id, session_id, RemovalReason::Closed).await;
    }

    async fn remove(&self, connection_id: &ConnectionId, session_id: &SessionId, reason: RemovalReason) {
        let result = self
            .request(|respond_to| RegistryCommand::Unregister {
                connection_id: connection_id.clone(),
                session_id: session_id.clone(),
                reason,
                respond_to,
            })
            .await;

        if let Err(e) = result {
            debug!(connection_id = %connection_id, error = %e, "Unregister skipped");
        }
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    /// Delivers a frame to exactly one connection.
    ///
    /// Returns whether it was delivered. A failed delivery unregisters the
    /// connection and is only logged.
    pub async fn send(&self, connection_id: &ConnectionId, frame: impl Into<ServerFrame>) -> bool {
        let (session_id, sink) = match self
            .request(|respond_to| RegistryCommand::GetConnection {
                connection_id: connection_id.clone(),
                respond_to,
            })
            .await
        {
            Ok(Some(found)) => found,
            Ok(None) | Err(_) => {
                debug!(connection_id = %connection_id, "Send to unknown connection ignored");
                return false;
            }
        };

        let frame = Arc::new(frame.into());
        match sink.deliver(frame).await {
            Ok(()) => true,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Delivery failed, dropping connection");
                self.remove(connection_id, &session_id, RemovalReason::DeliveryFailed)
                    .await;
                false
            }
        }
    }

    /// Delivers an envelope to every connection of `session_id` as of now.
    ///
    /// Returns the number of successful deliveries. Unknown sessions are a
    /// no-op. Failed connections are unregistered after the pass and do not
    /// prevent delivery to the rest.
    pub async fn broadcast(&self, session_id: &SessionId, envelope: &Envelope) -> usize {
        let snapshot: Option<SessionSnapshot> = self
            .request(|respond_to| RegistryCommand::Snapshot {
                session_id: session_id.clone(),
                respond_to,
            })
            .await
            .unwrap_or_default();

        let Some(snapshot) = snapshot else {
            debug!(session_id = %session_id, kind = envelope.kind(), "Broadcast to unknown session ignored");
            return 0;
        };

        let frame = Arc::new(ServerFrame::Envelope(envelope.clone()));
        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let _gate = snapshot.gate.lock().await;
            for (connection_id, sink) in &snapshot.members {
                match sink.deliver(Arc::clone(&frame)).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(
                            session_id = %session_id,
                            connection_id = %connection_id,
                            error = %e,
                            "Delivery failed, dropping connection"
                        );
                        failed.push(connection_id.clone());
                    }
                }
            }
        }

        for connection_id in &failed {
            self.remove(connection_id, session_id, RemovalReason::DeliveryFailed).await;
        }
        delivered
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Returns every live session. Empty if the actor is gone.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.request(|respond_to| RegistryCommand::ListSessions { respond_to })
            .await
            .unwrap_or_default()
    }

    /// Returns one session's membership, `None` if it does not exist.
    pub async fn get_session(&self, session_id: &SessionId) -> Option<SessionSummary> {
        self.request(|respond_to| RegistryCommand::GetSession {
            session_id: session_id.clone(),
            respond_to,
        })
        .await
        .ok()?
    }

    /// Returns the connection ids registered under `session_id`.
    pub async fn session_connections(&self, session_id: &SessionId) -> Vec<ConnectionId> {
        self.get_session(session_id)
            .await
            .map(|s| s.connections)
            .unwrap_or_default()
    }

    /// Returns session and connection counts.
    pub async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        self.request(|respond_to| RegistryCommand::Stats { respond_to }).await
    }

    /// Triggers a sweep of closed connections (fire-and-forget).
    pub async fn prune_closed(&self) {
        if self.sender.send(RegistryCommand::PruneClosed).await.is_err() {
            debug!("Prune skipped: registry channel closed");
        }
    }

    /// Returns true while the actor is running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
