//! Tracks one exchange among the envelopes a connection receives.
//!
//! A connection sees every exchange on its session, so the tracker latches
//! onto the first `stream_start` it observes and ignores envelopes with any
//! other message id.

use agentmux_core::{MessageId, SessionId};
use agentmux_protocol::Envelope;

use crate::error::{ClientError, Result};

/// Result of a finished exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub content: String,
    pub chunks: usize,
}

/// Folds envelopes into a [`Transcript`].
#[derive(Debug, Default)]
pub struct ExchangeTracker {
    current: Option<(MessageId, SessionId)>,
    content: String,
    chunks: usize,
}

impl ExchangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one envelope.
    ///
    /// `on_chunk` is called for each chunk of the tracked exchange.
    /// Returns the transcript once the exchange ends, or the error it
    /// failed with.
    pub fn accept<F>(&mut self, envelope: &Envelope, mut on_chunk: F) -> Result<Option<Transcript>>
    where
        F: FnMut(&str),
    {
        if self.current.is_none() {
            match envelope {
                Envelope::StreamStart { message_id, session_id } => {
                    self.current = Some((message_id.clone(), session_id.clone()));
                    return Ok(None);
                }
                // A client error is not tied to any exchange but is meant for us.
                Envelope::Error {
                    message_id: None, error, ..
                } => return Err(ClientError::Exchange(error.clone())),
                _ => return Ok(None),
            }
        }

        let Some((message_id, _)) = &self.current else {
            return Ok(None);
        };
        if envelope.message_id() != Some(message_id) {
            return Ok(None);
        }

        match envelope {
            Envelope::StreamChunk { chunk, .. } => {
                self.chunks += 1;
                self.content.push_str(chunk);
                on_chunk(chunk);
                Ok(None)
            }
            Envelope::StreamEnd { .. } => Ok(self.finish()),
            Envelope::Error { error, .. } => Err(ClientError::Exchange(error.clone())),
            Envelope::StreamStart { .. } => Ok(None),
        }
    }

    fn finish(&mut self) -> Option<Transcript> {
        let (message_id, session_id) = self.current.take()?;
        Some(Transcript {
            message_id,
            session_id,
            content: std::mem::take(&mut self.content),
            chunks: self.chunks,
        })
    }
}
