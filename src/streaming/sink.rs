use super::consumer::{StreamOutcome, StreamStatus};
use crate::Error;
use async_trait::async_trait;

/// How a consumer run ended, as reported to [`StreamSink::on_end`].
#[derive(Debug)]
pub enum StreamEnd<'a> {
    /// Completed, ended without a `done` frame, or cancelled.
    Finished(&'a StreamOutcome),
    /// Fatal transport error; the same error is returned by the consumer.
    Failed(&'a Error),
}

/// Receiver of a consumer's output.
///
/// `on_delta` is called once per content delta, in arrival order, with the
/// incremental text and the cumulative reply so far. `on_end` is called
/// exactly once per run, after the last `on_delta`.
#[async_trait]
pub trait StreamSink: Send {
    async fn on_delta(&mut self, delta: &str, accumulated: &str);

    async fn on_end(&mut self, end: StreamEnd<'_>);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl StreamSink for NoopSink {
    async fn on_delta(&mut self, _delta: &str, _accumulated: &str) {}

    async fn on_end(&mut self, _end: StreamEnd<'_>) {}
}

/// What a [`RecordingSink`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkRecord {
    Delta { delta: String, accumulated: String },
    Finished(StreamStatus),
    Failed(String),
}

/// In-memory sink for tests and non-interactive callers.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub records: Vec<SinkRecord>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremental texts in the order they were delivered.
    pub fn deltas(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Delta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of `on_end` calls seen.
    pub fn end_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, SinkRecord::Finished(_) | SinkRecord::Failed(_)))
            .count()
    }
}

#[async_trait]
impl StreamSink for RecordingSink {
    async fn on_delta(&mut self, delta: &str, accumulated: &str) {
        self.records.push(SinkRecord::Delta {
            delta: delta.to_string(),
            accumulated: accumulated.to_string(),
        });
    }

    async fn on_end(&mut self, end: StreamEnd<'_>) {
        self.records.push(match end {
            StreamEnd::Finished(outcome) => SinkRecord::Finished(outcome.status),
            StreamEnd::Failed(err) => SinkRecord::Failed(err.to_string()),
        });
    }
}
