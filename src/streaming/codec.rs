//! Line framing for the chat stream (bytes -> `data: ` frames).

use super::FrameDecodeError;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Marker every event line starts with.
pub const DATA_PREFIX: &str = "data: ";
/// Transport-level end-of-stream payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One complete `data: ` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload that is empty or exactly `[DONE]`.
    Sentinel,
    /// Payload text with the marker stripped.
    Data(String),
}

/// Splits a byte buffer on `\n` and yields the `data: ` frames it contains.
///
/// Bytes are buffered undecoded until the terminator arrives, so a multi-byte
/// character cut by a chunk boundary is decoded only once the whole line is
/// present. Lines without the marker (keep-alives, `:` comments, `event:`)
/// are consumed silently.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Bytes of the pending line already scanned for a terminator.
    next_index: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn classify(line: &[u8]) -> Result<Option<Frame>, FrameDecodeError> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) else {
            return Ok(None);
        };
        let payload = std::str::from_utf8(payload).map_err(FrameDecodeError::InvalidUtf8)?;
        if payload.is_empty() || payload == DONE_SENTINEL {
            return Ok(Some(Frame::Sentinel));
        }
        Ok(Some(Frame::Data(payload.to_string())))
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameDecodeError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameDecodeError> {
        loop {
            let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = buf.len();
                return Ok(None);
            };
            let line = buf.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            // The line is already out of the buffer, so an error here skips just this frame.
            if let Some(frame) = Self::classify(&line[..line.len() - 1])? {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameDecodeError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Unterminated trailing line.
        let line = buf.split();
        self.next_index = 0;
        Self::classify(&line)
    }
}
