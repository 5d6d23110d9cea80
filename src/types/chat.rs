use super::message::{HistoryTurn, Message};
use serde::{Deserialize, Serialize};

const DEFAULT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 30;

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default = "super::now_timestamp")]
    pub created_at: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Chat {
    /// A fresh, empty chat with a random id.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: default_title(),
            model: model.into(),
            pinned: false,
            created_at: super::now_timestamp(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Prior turns in `chat_history` form; turns with empty content are dropped.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(HistoryTurn::from)
            .collect()
    }

    /// Derive the title from the first prompt while the chat still has the default one.
    pub fn title_from_prompt(&mut self, prompt: &str) {
        if self.title != DEFAULT_TITLE {
            return;
        }
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return;
        }
        let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        if trimmed.chars().count() > TITLE_MAX_CHARS {
            title.push('…');
        }
        self.title = title;
    }

    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            model: self.model.clone(),
            pinned: self.pinned,
            created_at: self.created_at.clone(),
            message_count: self.messages.len(),
        }
    }
}

/// Chat metadata as returned by `GET /api/chats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub message_count: usize,
}
