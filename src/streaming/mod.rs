//! 流式响应模块：把聊天接口的分块字节流还原为有序的增量事件。
//!
//! # Streaming Chat Consumer
//!
//! The chat endpoint answers with a chunked text stream of `data: <payload>`
//! lines. Chunk boundaries carry no meaning: a line, a JSON object or a UTF-8
//! character may be cut anywhere.
//!
//! ```text
//! Raw Bytes → FrameCodec → FrameReader → StreamingChatConsumer → StreamSink
//!    │            │             │                 │
//!  HTTP      `data: ` lines  ContentDelta,    accumulate,
//!  body      (Sentinel/Data) Completion       cancel, report
//! ```
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`FrameCodec`] | `tokio_util` decoder that buffers bytes into complete frames |
//! | [`FrameReader`] | Pull-based reader turning frames into [`StreamEvent`]s |
//! | [`decode_events`] | The same decoding exposed as a boxed stream |
//! | [`StreamingChatConsumer`] | Drives one request's stream into a [`StreamSink`] |
//!
//! Error policy: a frame that fails to decode is logged and skipped; a stream
//! that ends without a `done` frame is reported as
//! [`StreamStatus::Incomplete`]; only transport failures are returned as errors.

pub mod codec;
pub mod consumer;
pub mod reader;
pub mod sink;

pub use codec::{Frame, FrameCodec, DATA_PREFIX, DONE_SENTINEL};
pub use consumer::{CancelHandle, StreamOutcome, StreamStatus, StreamingChatConsumer};
pub use reader::{decode_events, FrameReader};
pub use sink::{NoopSink, RecordingSink, SinkRecord, StreamEnd, StreamSink};

use crate::types::StreamEvent;
use serde_json::Value;

/// A single frame could not be turned into an event. Never fatal to the stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("frame payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error while framing: {0}")]
    Io(#[from] std::io::Error),
}

/// Interpret one frame payload.
///
/// A truthy `done` wins over `content`; a frame with neither yields nothing.
pub fn interpret_payload(payload: &str) -> Result<Option<StreamEvent>, FrameDecodeError> {
    let value: Value = serde_json::from_str(payload)?;

    if value.get("done").is_some_and(is_truthy) {
        let full_response = value
            .get("full_response")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(Some(StreamEvent::Completion { full_response }));
    }

    match value.get("content").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Ok(Some(StreamEvent::delta(text))),
        _ => Ok(None),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
