use super::codec::{Frame, FrameCodec};
use super::{interpret_payload, FrameDecodeError};
use crate::types::StreamEvent;
use crate::{BoxStream, Result};
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

/// Pull-based event reader over a chunked byte stream.
///
/// Owns the transport stream and a single line buffer for one request. After a
/// completion event, an exhausted source, or a transport error, the reader
/// yields nothing more and does not poll the source again.
pub struct FrameReader {
    input: BoxStream<'static, Bytes>,
    buffer: BytesMut,
    codec: FrameCodec,
    eof: bool,
    finished: bool,
    skipped_frames: usize,
}

impl FrameReader {
    pub fn new(input: BoxStream<'static, Bytes>) -> Self {
        Self {
            input,
            buffer: BytesMut::new(),
            codec: FrameCodec::new(),
            eof: false,
            finished: false,
            skipped_frames: 0,
        }
    }

    /// Frames dropped so far because they failed to decode.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Next event, `Ok(None)` once the stream is over.
    ///
    /// `Ok(None)` without a prior [`StreamEvent::Completion`] means the source
    /// ended early; the caller decides what that means.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if let Some(event) = self.drain_buffer() {
                if event.is_completion() {
                    self.finished = true;
                }
                return Ok(Some(event));
            }

            if self.eof {
                self.finished = true;
                return Ok(None);
            }

            match self.input.next().await {
                Some(Ok(chunk)) => {
                    debug!(bytes = chunk.len(), "chat stream chunk");
                    self.buffer.extend_from_slice(&chunk);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                None => {
                    self.eof = true;
                }
            }
        }
    }

    /// Decode buffered frames until one produces an event.
    fn drain_buffer(&mut self) -> Option<StreamEvent> {
        loop {
            let decoded = if self.eof {
                self.codec.decode_eof(&mut self.buffer)
            } else {
                self.codec.decode(&mut self.buffer)
            };

            let frame = match decoded {
                Ok(Some(frame)) => frame,
                Ok(None) => return None,
                Err(e) => {
                    self.skip_frame(&e);
                    continue;
                }
            };

            match frame {
                Frame::Sentinel => {
                    debug!("chat stream sentinel");
                }
                Frame::Data(payload) => match interpret_payload(&payload) {
                    Ok(Some(event)) => return Some(event),
                    Ok(None) => {}
                    Err(e) => self.skip_frame(&e),
                },
            }
        }
    }

    fn skip_frame(&mut self, error: &FrameDecodeError) {
        self.skipped_frames += 1;
        warn!(error = %error, skipped = self.skipped_frames, "skipping undecodable chat stream frame");
    }
}

/// Decode a chunked byte stream into [`StreamEvent`]s.
///
/// The output ends right after a completion event, when the source is
/// exhausted, or after yielding a transport error.
pub fn decode_events(input: BoxStream<'static, Bytes>) -> BoxStream<'static, StreamEvent> {
    let stream = stream::unfold(FrameReader::new(input), |mut reader| async move {
        match reader.next_event().await {
            Ok(Some(event)) => Some((Ok(event), reader)),
            Ok(None) => None,
            Err(e) => Some((Err(e), reader)),
        }
    });
    Box::pin(stream)
}
