//! Per-connection send capability.
//!
//! A sink is the write side of a bounded channel drained by the transport
//! (socket writer task or SSE response body). Delivery fails when the
//! transport is gone or has stopped draining for longer than
//! [`WRITE_TIMEOUT`].

use std::sync::Arc;
use std::time::Duration;

use agentmux_protocol::ServerFrame;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Write timeout (10 seconds)
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-connection buffer, in frames.
pub const SINK_CAPACITY: usize = 256;

/// Frames as they travel to a transport. Shared so that a broadcast
/// serializes nothing until each writer encodes it.
pub type OutboundFrame = Arc<ServerFrame>;

/// Why a frame could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("write timed out after {}s", WRITE_TIMEOUT.as_secs())]
    Timeout,
}

/// Opaque send capability for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionSink {
    tx: mpsc::Sender<OutboundFrame>,
}

impl ConnectionSink {
    /// Creates a sink and the receiver its transport must drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queues a frame for the transport.
    pub async fn deliver(&self, frame: OutboundFrame) -> Result<(), DeliveryError> {
        match timeout(WRITE_TIMEOUT, self.tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }

    /// Returns true once the transport has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
