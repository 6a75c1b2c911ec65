//! Bridge for synchronous producers.
//!
//! ```text
//! spawn_blocking thread                     async relay
//! ┌───────────────────┐   mpsc (bounded)   ┌────────────┐
//! │ iterator.next()   │ ─────────────────► │ rx.recv()  │
//! │ blocking_send()   │                    │ (stream)   │
//! └───────────────────┘                    └────────────┘
//! ```
//!
//! When the stream is dropped (relay finished or cancelled) the channel
//! closes and the producer thread stops at its next send.

use std::sync::Arc;

use agentmux_core::{ExchangeRequest, FragmentSource, FragmentStream, SourceError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Channel capacity between the producer thread and the relay.
const BRIDGE_CAPACITY: usize = 16;

type Producer<I> = dyn Fn(ExchangeRequest) -> I + Send + Sync;

/// Runs a blocking fragment iterator on tokio's blocking pool.
pub struct BlockingSource<I> {
    name: String,
    producer: Arc<Producer<I>>,
}

impl<I> BlockingSource<I>
where
    I: IntoIterator<Item = Result<String, SourceError>> + 'static,
{
    /// Wraps a function that builds the iterator for one exchange.
    ///
    /// The function itself runs on the blocking thread too.
    pub fn new<F>(name: impl Into<String>, producer: F) -> Self
    where
        F: Fn(ExchangeRequest) -> I + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            producer: Arc::new(producer),
        }
    }
}

#[async_trait]
impl<I> FragmentSource for BlockingSource<I>
where
    I: IntoIterator<Item = Result<String, SourceError>> + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, request: &ExchangeRequest) -> Result<FragmentStream, SourceError> {
        let (tx, rx) = mpsc::channel(BRIDGE_CAPACITY);
        let producer = Arc::clone(&self.producer);
        let request = request.clone();

        tokio::task::spawn_blocking(move || {
            for item in (*producer)(request) {
                let stop = item.is_err();
                if tx.blocking_send(item).is_err() {
                    debug!("Blocking producer stopped, receiver dropped");
                    return;
                }
                if stop {
                    return;
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }
}
