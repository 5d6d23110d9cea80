use super::reader::FrameReader;
use super::sink::{StreamEnd, StreamSink};
use crate::types::StreamEvent;
use crate::{BoxStream, Result};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Terminal status of a consumer run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// A `done` frame was received.
    Completed,
    /// The source ended without a `done` frame.
    Incomplete,
    /// The caller cancelled before the stream finished.
    Cancelled,
}

/// Result of a consumer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub status: StreamStatus,
    /// Concatenation of every delivered delta.
    pub response: String,
    pub deltas: usize,
    pub skipped_frames: usize,
    /// `full_response` echoed in the server's done frame, if any.
    pub full_response: Option<String>,
}

impl StreamOutcome {
    /// Outcome of a run cancelled before any byte was read.
    pub fn cancelled() -> Self {
        Self {
            status: StreamStatus::Cancelled,
            response: String::new(),
            deltas: 0,
            skipped_frames: 0,
            full_response: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StreamStatus::Completed
    }
}

/// Cancels an in-flight consumer. Cheap to clone; cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Consumes the streamed body of one chat request.
///
/// Create one per request; it is consumed by [`consume`](Self::consume).
pub struct StreamingChatConsumer {
    model: String,
    prompt_chars: usize,
    cancel: CancelHandle,
}

impl StreamingChatConsumer {
    /// `model` and `prompt` identify the request in logs.
    pub fn new(model: impl Into<String>, prompt: &str) -> Self {
        Self {
            model: model.into(),
            prompt_chars: prompt.chars().count(),
            cancel: CancelHandle::new(),
        }
    }

    /// Stop reading when `handle` is cancelled.
    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Handle that cancels this consumer.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drive `source` to the end, feeding `sink`.
    ///
    /// Returns the outcome for completed, incomplete and cancelled runs. A
    /// transport error is reported to the sink and returned; no event follows
    /// it. The source is dropped before this returns on every path.
    pub async fn consume<S>(self, source: BoxStream<'static, Bytes>, sink: &mut S) -> Result<StreamOutcome>
    where
        S: StreamSink + ?Sized,
    {
        info!(model = %self.model, prompt_chars = self.prompt_chars, "consuming chat stream");

        let mut reader = FrameReader::new(source);
        let mut response = String::new();
        let mut deltas = 0usize;
        let mut full_response = None;

        let status = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.token.cancelled() => break StreamStatus::Cancelled,
                next = reader.next_event() => next,
            };

            match next {
                Ok(Some(StreamEvent::ContentDelta { text })) => {
                    response.push_str(&text);
                    deltas += 1;
                    sink.on_delta(&text, &response).await;
                }
                Ok(Some(StreamEvent::Completion { full_response: echoed })) => {
                    full_response = echoed;
                    break StreamStatus::Completed;
                }
                Ok(None) => break StreamStatus::Incomplete,
                Err(e) => {
                    drop(reader);
                    warn!(model = %self.model, deltas, error = %e, "chat stream transport failed");
                    sink.on_end(StreamEnd::Failed(&e)).await;
                    return Err(e);
                }
            }
        };

        let skipped_frames = reader.skipped_frames();
        drop(reader);

        let outcome = StreamOutcome {
            status,
            response,
            deltas,
            skipped_frames,
            full_response,
        };

        match status {
            StreamStatus::Completed => {
                info!(model = %self.model, deltas, skipped_frames, "chat stream completed")
            }
            StreamStatus::Incomplete => warn!(
                model = %self.model,
                deltas,
                "chat stream ended without a completion frame"
            ),
            StreamStatus::Cancelled => info!(model = %self.model, deltas, "chat stream cancelled"),
        }

        sink.on_end(StreamEnd::Finished(&outcome)).await;
        Ok(outcome)
    }
}
