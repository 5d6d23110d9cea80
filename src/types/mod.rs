//! 类型系统模块：定义聊天记录、消息、请求与流式事件的核心数据类型。
//!
//! # Types Module
//!
//! Wire-compatible representations of everything the WALL-E service exchanges.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Chat`] | A persisted conversation with its messages |
//! | [`ChatSummary`] | Sidebar entry as listed by the chat store |
//! | [`Message`] | One turn: role, content, timestamp, optional rating |
//! | [`ChatRequest`] | Body of `POST /api/chat` |
//! | [`StreamEvent`] | Decoded streaming event (content delta or completion) |
//!
//! ## Example
//!
//! ```rust
//! use walle_client::types::{Chat, Message};
//!
//! let mut chat = Chat::new("openai/gpt-4o-mini");
//! chat.push(Message::user("Hello"));
//! assert_eq!(chat.history().len(), 1);
//! ```

pub mod chat;
pub mod events;
pub mod message;
pub mod request;

pub use chat::{Chat, ChatSummary};
pub use events::StreamEvent;
pub use message::{HistoryTurn, Message, MessageRole};
pub use request::{ChatRequest, CompletionResponse};

/// Current time in the timestamp format stored on chats and messages.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS`
/// form SQLite's `CURRENT_TIMESTAMP` produces on the server.
pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&chrono::Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
