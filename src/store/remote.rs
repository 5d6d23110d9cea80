use super::ChatStore;
use crate::transport::HttpTransport;
use crate::types::{Chat, ChatSummary};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info};
use url::form_urlencoded;

const CHATS_PATH: &str = "/api/chats";

/// Chat store backed by the service's `/api/chats` endpoints.
pub struct RemoteChatStore {
    transport: Arc<HttpTransport>,
}

impl RemoteChatStore {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    /// `/api/chats/{id}` with the id percent-encoded as one path segment.
    fn chat_path(chat_id: &str) -> String {
        // byte_serialize writes spaces as `+`, which a path keeps literally.
        let segment = form_urlencoded::byte_serialize(chat_id.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        format!("{CHATS_PATH}/{segment}")
    }
}

#[async_trait]
impl ChatStore for RemoteChatStore {
    async fn get(&self, chat_id: &str) -> Result<Option<Chat>> {
        match self.transport.get_json::<Chat>(&Self::chat_path(chat_id)).await {
            Ok(chat) => Ok(Some(chat)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, chat: &Chat) -> Result<Chat> {
        // PUT only updates existing chats; the first save of a new chat has to POST.
        match self
            .transport
            .send_json::<Chat, Chat>(Method::PUT, &Self::chat_path(&chat.id), chat)
            .await
        {
            Ok(saved) => {
                debug!(chat_id = %saved.id, messages = saved.messages.len(), "chat updated");
                Ok(saved)
            }
            Err(Error::NotFound(_)) => {
                let created: Chat = self.transport.send_json(Method::POST, CHATS_PATH, chat).await?;
                info!(chat_id = %created.id, "chat created");
                Ok(created)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, chat_id: &str) -> Result<()> {
        self.transport.delete(&Self::chat_path(chat_id)).await?;
        info!(chat_id, "chat deleted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ChatSummary>> {
        self.transport.get_json(CHATS_PATH).await
    }
}
