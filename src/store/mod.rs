//! Chat persistence seam.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | [`RemoteChatStore`] | WALL-E `/api/chats` CRUD over HTTP |
//! | [`InMemoryChatStore`] | Process-local map, for tests and offline use |

pub mod memory;
pub mod remote;

pub use memory::InMemoryChatStore;
pub use remote::RemoteChatStore;

use crate::types::{Chat, ChatSummary};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// `Ok(None)` when no chat has this id.
    async fn get(&self, chat_id: &str) -> Result<Option<Chat>>;

    /// Create or replace a chat; returns the stored version.
    async fn save(&self, chat: &Chat) -> Result<Chat>;

    async fn delete(&self, chat_id: &str) -> Result<()>;

    /// Summaries, newest first.
    async fn list(&self) -> Result<Vec<ChatSummary>>;
}
