//! Scripted source for demos and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentmux_core::{ExchangeRequest, FragmentSource, FragmentStream, SourceError};
use async_trait::async_trait;

/// Replays a fixed fragment list for every exchange.
///
/// Builder options:
/// - [`fail_after`](Self::fail_after): yield an error after N fragments
/// - [`fail_on_open`](Self::fail_on_open): refuse to start at all
/// - [`with_delay`](Self::with_delay): sleep before each fragment
/// - [`stall`](Self::stall): never finish after the last fragment
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    fragments: Vec<String>,
    fail_after: Option<(usize, String)>,
    open_error: Option<String>,
    delay: Option<Duration>,
    stall: bool,
    opened: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: None,
            open_error: None,
            delay: None,
            stall: false,
            opened: Arc::new(AtomicUsize::new(0)),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Yields `error` after the first `count` fragments.
    #[must_use]
    pub fn fail_after(mut self, count: usize, error: impl Into<String>) -> Self {
        self.fail_after = Some((count, error.into()));
        self
    }

    #[must_use]
    pub fn fail_on_open(mut self, error: impl Into<String>) -> Self {
        self.open_error = Some(error.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Keeps the stream pending forever once the fragments are used up.
    #[must_use]
    pub fn stall(mut self) -> Self {
        self.stall = true;
        self
    }

    /// Number of exchanges opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of fragments (or errors) handed out so far, across exchanges.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FragmentSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, _request: &ExchangeRequest) -> Result<FragmentStream, SourceError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.open_error {
            return Err(SourceError::Failed(error.clone()));
        }

        let (fragments, failure) = match &self.fail_after {
            Some((count, error)) => (
                self.fragments.iter().take(*count).cloned().collect::<Vec<_>>(),
                Some(error.clone()),
            ),
            None => (self.fragments.clone(), None),
        };
        let delay = self.delay;
        let stall = self.stall;
        let pulled = Arc::clone(&self.pulled);

        let stream = async_stream::stream! {
            for fragment in fragments {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                pulled.fetch_add(1, Ordering::SeqCst);
                yield Ok(fragment);
            }
            if let Some(error) = failure {
                pulled.fetch_add(1, Ordering::SeqCst);
                yield Err(SourceError::Failed(error));
                return;
            }
            if stall {
                futures::future::pending::<()>().await;
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmux_core::SessionId;
    use futures::StreamExt;

    fn request() -> ExchangeRequest {
        ExchangeRequest::new(SessionId::new("s"), "ignored")
    }

    #[tokio::test]
    async fn test_replays_fragments() {
        let source = ScriptedSource::new(["a", "", "b"]);
        let items: Vec<_> = source.open(&request()).await.unwrap().collect().await;
        assert_eq!(items, vec![Ok("a".to_string()), Ok(String::new()), Ok("b".to_string())]);
        assert_eq!(source.opened(), 1);
        assert_eq!(source.pulled(), 3);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let source = ScriptedSource::new(["a", "b", "c"]).fail_after(1, "upstream down");
        let items: Vec<_> = source.open(&request()).await.unwrap().collect().await;
        assert_eq!(
            items,
            vec![Ok("a".to_string()), Err(SourceError::Failed("upstream down".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_fail_on_open() {
        let source = ScriptedSource::new(["a"]).fail_on_open("no credentials");
        assert!(source.open(&request()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_never_ends() {
        let source = ScriptedSource::new(["a"]).stall();
        let mut stream = source.open(&request()).await.unwrap();
        assert_eq!(stream.next().await, Some(Ok("a".to_string())));
        let next = tokio::time::timeout(Duration::from_secs(60), stream.next()).await;
        assert!(next.is_err());
    }
}
