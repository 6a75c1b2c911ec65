//! Connection registry using Actor pattern.
//!
//! The registry tracks which live connections belong to which session and
//! is the only place that knows how to reach a connection. Relays and
//! transport adapters talk to it exclusively through [`RegistryHandle`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  RegistryCommand  ┌─────────────────┐
//! │ Adapters/Relays │──────────────────▶│  RegistryActor  │
//! │ (RegistryHandle)│◀──────────────────│  (maps owner)   │
//! └────────┬────────┘  oneshot replies  └─────────────────┘
//!          │                                  │
//!          │ deliver() in caller task         │ HashMap<SessionId, members>
//!          ▼                                  │ HashMap<ConnectionId, sink>
//! ┌─────────────────┐                         │
//! │ ConnectionSink  │─────▶ socket writer / SSE body
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::debug;

mod actor;
mod commands;
mod handle;
mod sink;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError, RegistryStats, RemovalReason, SessionSnapshot};
pub use handle::RegistryHandle;
pub use sink::{ConnectionSink, DeliveryError, OutboundFrame, SINK_CAPACITY, WRITE_TIMEOUT};

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Closed-connection sweep interval in seconds
const CLEANUP_INTERVAL_SECS: u64 = 30;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates the command channel
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Spawns a background sweep for connections whose transport is gone
/// 4. Returns a RegistryHandle for client use
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    let handle = RegistryHandle::new(cmd_tx);
    spawn_cleanup_task(handle.clone());

    handle
}

/// Spawn a background task that periodically prunes closed connections.
fn spawn_cleanup_task(handle: RegistryHandle) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

        loop {
            ticker.tick().await;

            if !handle.is_connected() {
                debug!("Cleanup task stopping: registry channel closed");
                break;
            }
            handle.prune_closed().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmux_core::{MessageId, SessionId};
    use agentmux_protocol::Envelope;

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_prunes_dropped_transports() {
        let registry = spawn_registry();
        let (sink, rx) = ConnectionSink::channel(4);
        registry.register(SessionId::new("s"), sink).await;
        drop(rx);

        tokio::time::sleep(Duration::from_secs(CLEANUP_INTERVAL_SECS + 1)).await;

        assert!(registry.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_its_session() {
        let registry = spawn_registry();
        let s = SessionId::new("S");
        let (sink1, mut rx1) = ConnectionSink::channel(4);
        let (sink2, mut rx2) = ConnectionSink::channel(4);
        let (other, mut other_rx) = ConnectionSink::channel(4);
        registry.register(s.clone(), sink1).await;
        registry.register(s.clone(), sink2).await;
        registry.register(SessionId::new("T"), other).await;

        let env = Envelope::start(MessageId::new("m"), s.clone());
        assert_eq!(registry.broadcast(&s, &env).await, 2);

        assert_eq!(rx1.recv().await.unwrap().as_envelope(), Some(&env));
        assert_eq!(rx2.recv().await.unwrap().as_envelope(), Some(&env));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_session_is_noop() {
        let registry = spawn_registry();
        let s = SessionId::new("nobody");
        assert_eq!(registry.broadcast(&s, &Envelope::end(MessageId::new("m"), s.clone())).await, 0);
    }

    #[tokio::test]
    async fn test_dead_member_does_not_block_others() {
        let registry = spawn_registry();
        let s = SessionId::new("S");
        let (dead, dead_rx) = ConnectionSink::channel(4);
        let (live, mut live_rx) = ConnectionSink::channel(4);
        registry.register(s.clone(), dead).await;
        let live_id = registry.register(s.clone(), live).await;
        drop(dead_rx);

        let env = Envelope::chunk(MessageId::new("m"), s.clone(), "a");
        assert_eq!(registry.broadcast(&s, &env).await, 1);
        assert!(live_rx.recv().await.is_some());
        assert_eq!(registry.session_connections(&s).await, vec![live_id]);
    }

    #[tokio::test]
    async fn test_unregister_mid_broadcast_is_harmless() {
        let registry = spawn_registry();
        let s = SessionId::new("S");
        let (sink1, _rx1) = ConnectionSink::channel(1);
        let (sink2, mut rx2) = ConnectionSink::channel(16);
        let c1 = registry.register(s.clone(), sink1).await;
        registry.register(s.clone(), sink2).await;

        let broadcaster = {
            let registry = registry.clone();
            let s = s.clone();
            tokio::spawn(async move {
                let mut total = 0;
                for i in 0..5 {
                    let env = Envelope::chunk(MessageId::new("m"), s.clone(), i.to_string());
                    total += registry.broadcast(&s, &env).await;
                }
                total
            })
        };
        registry.unregister(&c1, &s).await;
        drop(_rx1);

        let _ = broadcaster.await.unwrap();
        let mut received = 0;
        while rx2.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 5);
    }

    #[tokio::test]
    async fn test_send_targets_one_connection() {
        let registry = spawn_registry();
        let s = SessionId::new("S");
        let (sink1, mut rx1) = ConnectionSink::channel(4);
        let (sink2, mut rx2) = ConnectionSink::channel(4);
        let c1 = registry.register(s.clone(), sink1).await;
        registry.register(s.clone(), sink2).await;

        assert!(registry.send(&c1, Envelope::client_error(s.clone(), "bad frame")).await);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_failure_unregisters() {
        let registry = spawn_registry();
        let s = SessionId::new("S");
        let (sink, rx) = ConnectionSink::channel(4);
        let c = registry.register(s.clone(), sink).await;
        drop(rx);

        assert!(!registry.send(&c, Envelope::client_error(s.clone(), "x")).await);
        assert!(registry.get_session(&s).await.is_none());
    }

    #[tokio::test]
    async fn test_last_unregister_removes_session() {
        let registry = spawn_registry();
        let s = SessionId::new("S");
        let (sink, _rx) = ConnectionSink::channel(4);
        let c = registry.register(s.clone(), sink).await;
        assert_eq!(registry.list_sessions().await.len(), 1);

        registry.unregister(&c, &s).await;
        registry.unregister(&c, &s).await;
        assert!(registry.list_sessions().await.is_empty());
        assert_eq!(registry.stats().await.unwrap(), RegistryStats::default());
    }
}
