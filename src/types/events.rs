//! Streaming events decoded from the chat endpoint

use serde::{Deserialize, Serialize};

/// Application-level streaming event.
///
/// `[DONE]` sentinels are a frame-level concern and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum StreamEvent {
    /// Incremental piece of assistant output, in arrival order.
    #[serde(rename = "ContentDelta")]
    ContentDelta { text: String },

    /// End of stream; nothing follows.
    #[serde(rename = "Completion")]
    Completion {
        /// Full reply as echoed by the server, when it sends one.
        #[serde(skip_serializing_if = "Option::is_none")]
        full_response: Option<String>,
    },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamEvent::ContentDelta { text: text.into() }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, StreamEvent::Completion { .. })
    }
}
