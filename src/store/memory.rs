use super::ChatStore;
use crate::types::{parse_timestamp, Chat, ChatSummary};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local chat store.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    chats: RwLock<HashMap<String, Chat>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.chats.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.read().await.is_empty()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn get(&self, chat_id: &str) -> Result<Option<Chat>> {
        Ok(self.chats.read().await.get(chat_id).cloned())
    }

    async fn save(&self, chat: &Chat) -> Result<Chat> {
        self.chats.write().await.insert(chat.id.clone(), chat.clone());
        Ok(chat.clone())
    }

    async fn delete(&self, chat_id: &str) -> Result<()> {
        self.chats.write().await.remove(chat_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ChatSummary>> {
        let mut summaries: Vec<ChatSummary> = self.chats.read().await.values().map(Chat::summary).collect();
        // Server rows use SQLite timestamps, local chats RFC 3339; compare parsed values.
        summaries.sort_by(|a, b| {
            let key = |s: &ChatSummary| (parse_timestamp(&s.created_at), s.created_at.clone());
            key(b).cmp(&key(a))
        });
        Ok(summaries)
    }
}
