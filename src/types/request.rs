use super::message::HistoryTurn;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub model: String,
    pub stream: bool,
    pub chat_history: Vec<HistoryTurn>,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Build a streaming request. The prompt is trimmed and must not be empty.
    pub fn streaming(
        prompt: &str,
        model: impl Into<String>,
        chat_history: Vec<HistoryTurn>,
        max_tokens: u32,
    ) -> Result<Self> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::invalid_request_with_context(
                "prompt is required",
                ErrorContext::new().with_field_path("request.prompt"),
            ));
        }
        let model = model.into();
        if model.trim().is_empty() {
            return Err(Error::invalid_request_with_context(
                "model is required",
                ErrorContext::new().with_field_path("request.model"),
            ));
        }
        Ok(Self {
            prompt: prompt.to_string(),
            model,
            stream: true,
            chat_history: chat_history
                .into_iter()
                .filter(|t| !t.content.is_empty())
                .collect(),
            max_tokens,
        })
    }

    /// Same request, non-streaming.
    pub fn into_blocking(mut self) -> Self {
        self.stream = false;
        self
    }
}

/// Response of a non-streaming `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub model: String,
    pub response: String,
    #[serde(default)]
    pub status: Option<String>,
}
