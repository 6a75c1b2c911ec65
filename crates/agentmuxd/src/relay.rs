//! Stream relay - drives one exchange from a fragment source to a session.
//!
//! ```text
//!                 open()            next()            broadcast()
//! ExchangeRequest ─────▶ FragmentStream ────▶ fragment ─────────▶ RegistryHandle
//!                                                                  (session fan-out)
//! ```
//!
//! Envelope sequence per `message_id`:
//!
//! 1. `stream_start`
//! 2. one `stream_chunk` per non-empty fragment, in order, without delay
//! 3. `stream_end` on exhaustion, or one `error` on source failure
//!
//! Cancellation stops pulling immediately and emits nothing further.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agentmux_core::{ExchangeRequest, FragmentSource, MessageId};
use agentmux_protocol::Envelope;

use crate::registry::RegistryHandle;

/// How a relay run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// `stream_end` was emitted.
    Completed { message_id: MessageId, chunks: usize },
    /// An `error` envelope was emitted.
    Failed {
        message_id: MessageId,
        chunks: usize,
        error: String,
    },
    /// Stopped by cancellation, no terminal envelope.
    Cancelled { message_id: MessageId, chunks: usize },
}

impl RelayOutcome {
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Completed { message_id, .. }
            | Self::Failed { message_id, .. }
            | Self::Cancelled { message_id, .. } => message_id,
        }
    }
}

/// Per-exchange coordinator between a fragment source and the registry.
#[derive(Clone)]
pub struct StreamRelay {
    registry: RegistryHandle,
    source: Arc<dyn FragmentSource>,
}

impl StreamRelay {
    pub fn new(registry: RegistryHandle, source: Arc<dyn FragmentSource>) -> Self {
        Self { registry, source }
    }

    /// Runs one exchange under a freshly generated message id.
    pub async fn run(&self, request: ExchangeRequest, cancel: CancellationToken) -> RelayOutcome {
        self.run_as(MessageId::generate(), request, cancel).await
    }

    /// Runs one exchange under a caller-chosen message id.
    ///
    /// Used when the caller must recognize its own envelopes among others
    /// on the same session.
    pub async fn run_as(
        &self,
        message_id: MessageId,
        request: ExchangeRequest,
        cancel: CancellationToken,
    ) -> RelayOutcome {
        let session_id = request.session_id.clone();
        let mut chunks = 0usize;

        if cancel.is_cancelled() {
            return RelayOutcome::Cancelled { message_id, chunks };
        }

        info!(
            session_id = %session_id,
            message_id = %message_id,
            source = self.source.name(),
            "Exchange started"
        );
        self.registry
            .broadcast(&session_id, &Envelope::start(message_id.clone(), session_id.clone()))
            .await;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.source.open(&request) => Some(opened),
        };

        let mut stream = match opened {
            None => return self.cancelled(message_id, chunks),
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return self.fail(message_id, &request, chunks, e.to_string()).await,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(message_id, chunks),
                next = stream.next() => next,
            };

            if cancel.is_cancelled() {
                return self.cancelled(message_id, chunks);
            }

            match next {
                Some(Ok(fragment)) if fragment.is_empty() => continue,
                Some(Ok(fragment)) => {
                    chunks += 1;
                    self.registry
                        .broadcast(
                            &session_id,
                            &Envelope::chunk(message_id.clone(), session_id.clone(), fragment),
                        )
                        .await;
                }
                Some(Err(e)) => return self.fail(message_id, &request, chunks, e.to_string()).await,
                None => break,
            }
        }

        self.registry
            .broadcast(&session_id, &Envelope::end(message_id.clone(), session_id.clone()))
            .await;
        info!(
            session_id = %session_id,
            message_id = %message_id,
            chunks,
            "Exchange completed"
        );
        RelayOutcome::Completed { message_id, chunks }
    }

    async fn fail(
        &self,
        message_id: MessageId,
        request: &ExchangeRequest,
        chunks: usize,
        error: String,
    ) -> RelayOutcome {
        let session_id = &request.session_id;
        let description = format!("generation failed: {error}");
        warn!(
            session_id = %session_id,
            message_id = %message_id,
            chunks,
            error = %error,
            "Exchange failed"
        );
        self.registry
            .broadcast(
                session_id,
                &Envelope::failure(message_id.clone(), session_id.clone(), description.clone()),
            )
            .await;
        RelayOutcome::Failed {
            message_id,
            chunks,
            error: description,
        }
    }

    fn cancelled(&self, message_id: MessageId, chunks: usize) -> RelayOutcome {
        debug!(message_id = %message_id, chunks, "Exchange cancelled");
        RelayOutcome::Cancelled { message_id, chunks }
    }
}
