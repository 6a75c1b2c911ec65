//! Registry actor - owns connection and session state and processes commands.
//!
//! The RegistryActor is the single owner of the session → connections and
//! connection → sink maps. It receives commands via an mpsc channel and
//! answers over oneshot channels.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use pattern matching or `unwrap_or`
//! - Response send failures are ignored (the caller went away)

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use agentmux_core::{ConnectionId, SessionId};
use agentmux_protocol::SessionSummary;

use super::commands::{RegistryCommand, RegistryStats, RemovalReason, SessionSnapshot};
use super::sink::ConnectionSink;

// ============================================================================
// State
// ============================================================================

struct SessionEntry {
    members: BTreeSet<ConnectionId>,
    opened_at: DateTime<Utc>,
    gate: Arc<Mutex<()>>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            members: BTreeSet::new(),
            opened_at: Utc::now(),
            gate: Arc::new(Mutex::new(())),
        }
    }

    fn summary(&self, session_id: &SessionId) -> SessionSummary {
        SessionSummary {
            session_id: session_id.clone(),
            connections: self.members.iter().cloned().collect(),
            opened_at: self.opened_at,
        }
    }
}

struct ConnectionEntry {
    session_id: SessionId,
    sink: ConnectionSink,
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor.
///
/// # Ownership
///
/// The actor owns:
/// - `sessions`: session → member connection ids (plus delivery gate)
/// - `connections`: connection → owning session and sink
///
/// A session exists exactly while it has at least one member.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially,
/// so every mutation and snapshot is atomic with respect to the others.
pub struct RegistryActor {
    receiver: mpsc::Receiver<RegistryCommand>,
    sessions: HashMap<SessionId, SessionEntry>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl RegistryActor {
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            sessions = self.sessions.len(),
            connections = self.connections.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                connection_id,
                session_id,
                sink,
                respond_to,
            } => {
                self.handle_register(connection_id, session_id, sink);
                let _ = respond_to.send(());
            }
            RegistryCommand::Unregister {
                connection_id,
                session_id,
                reason,
                respond_to,
            } => {
                let removed = self.handle_unregister(&connection_id, &session_id, reason);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Snapshot { session_id, respond_to } => {
                let _ = respond_to.send(self.snapshot(&session_id));
            }
            RegistryCommand::GetConnection {
                connection_id,
                respond_to,
            } => {
                let found = self
                    .connections
                    .get(&connection_id)
                    .map(|c| (c.session_id.clone(), c.sink.clone()));
                let _ = respond_to.send(found);
            }
            RegistryCommand::ListSessions { respond_to } => {
                let mut sessions: Vec<SessionSummary> = self
                    .sessions
                    .iter()
                    .map(|(id, entry)| entry.summary(id))
                    .collect();
                sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
                let _ = respond_to.send(sessions);
            }
            RegistryCommand::GetSession { session_id, respond_to } => {
                let summary = self.sessions.get(&session_id).map(|e| e.summary(&session_id));
                let _ = respond_to.send(summary);
            }
            RegistryCommand::Stats { respond_to } => {
                let _ = respond_to.send(RegistryStats {
                    sessions: self.sessions.len(),
                    connections: self.connections.len(),
                });
            }
            RegistryCommand::PruneClosed => {
                self.handle_prune_closed();
            }
        }
    }

    fn handle_register(&mut self, connection_id: ConnectionId, session_id: SessionId, sink: ConnectionSink) {
        let entry = self.sessions.entry(session_id.clone()).or_insert_with(|| {
            debug!(session_id = %session_id, "Session opened");
            SessionEntry::new()
        });
        entry.members.insert(connection_id.clone());

        info!(
            session_id = %session_id,
            connection_id = %connection_id,
            members = entry.members.len(),
            "Connection registered"
        );

        self.connections
            .insert(connection_id, ConnectionEntry { session_id, sink });
    }

    /// Removes a connection. Unknown ids are a no-op.
    ///
    /// The session recorded at registration wins over the one supplied by
    /// the caller.
    fn handle_unregister(
        &mut self,
        connection_id: &ConnectionId,
        session_id: &SessionId,
        reason: RemovalReason,
    ) -> bool {
        let Some(connection) = self.connections.remove(connection_id) else {
            return false;
        };

        if &connection.session_id != session_id {
            debug!(
                connection_id = %connection_id,
                supplied = %session_id,
                recorded = %connection.session_id,
                "Unregister named a different session, using the recorded one"
            );
        }

        let owner = connection.session_id;
        let now_empty = match self.sessions.get_mut(&owner) {
            Some(entry) => {
                entry.members.remove(connection_id);
                entry.members.is_empty()
            }
            None => false,
        };

        info!(
            session_id = %owner,
            connection_id = %connection_id,
            reason = %reason,
            "Connection unregistered"
        );

        if now_empty {
            self.sessions.remove(&owner);
            debug!(session_id = %owner, "Session closed");
        }
        true
    }

    fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        let entry = self.sessions.get(session_id)?;
        let members = entry
            .members
            .iter()
            .filter_map(|id| {
                self.connections
                    .get(id)
                    .map(|conn| (id.clone(), conn.sink.clone()))
            })
            .collect();
        Some(SessionSnapshot {
            gate: Arc::clone(&entry.gate),
            members,
        })
    }

    fn handle_prune_closed(&mut self) {
        let dead: Vec<(ConnectionId, SessionId)> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.sink.is_closed())
            .map(|(id, conn)| (id.clone(), conn.session_id.clone()))
            .collect();

        if dead.is_empty() {
            return;
        }

        for (connection_id, session_id) in &dead {
            self.handle_unregister(connection_id, session_id, RemovalReason::Pruned);
        }
        info!(count = dead.len(), "Pruned closed connections");
    }
}
