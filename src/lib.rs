//! # walle-client
//!
//! 这是 WALL•E 聊天服务的 Rust 客户端运行时，负责流式回复解析、聊天记录存取与会话控制。
//!
//! Client runtime for the WALL•E chat service.
//!
//! ## Overview
//!
//! The service exposes chat CRUD over HTTP/JSON and a chat-completion endpoint
//! whose reply is a chunked stream of `data: <json>` lines. This crate turns
//! that stream into ordered content deltas, persists conversations through a
//! pluggable [`store::ChatStore`], and serializes sends per chat with an
//! explicit state machine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use walle_client::{ChatApp, ClientConfig, RecordingSink};
//!
//! #[tokio::main]
//! async fn main() -> walle_client::Result<()> {
//!     let mut app = ChatApp::connect(ClientConfig::from_env()?).await?;
//!     app.new_chat(None).await?;
//!
//!     let mut sink = RecordingSink::new();
//!     let outcome = app.send_message("Hello, WALL•E!", &mut sink).await?;
//!     println!("{}", outcome.response);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`streaming`] | Frame codec, event reader and the streaming chat consumer |
//! | [`transport`] | reqwest-backed HTTP transport and the [`transport::ChatApi`] seam |
//! | [`store`] | Chat persistence (remote and in-memory) |
//! | [`session`] | Per-chat state machine and the [`ChatApp`] context |
//! | [`config`] | Local client configuration and the remote config document |
//! | [`types`] | Chats, messages, requests and stream events |

pub mod config;
pub mod session;
pub mod store;
pub mod streaming;
pub mod transport;
pub mod types;

pub use config::{AppConfig, ClientConfig};
pub use session::{ChatApp, SessionEvent, SessionState};
pub use store::{ChatStore, InMemoryChatStore, RemoteChatStore};
pub use streaming::{
    decode_events, CancelHandle, NoopSink, RecordingSink, StreamEnd, StreamOutcome, StreamSink, StreamStatus,
    StreamingChatConsumer,
};
pub use transport::{ChatApi, HttpTransport};
pub use types::{Chat, ChatRequest, ChatSummary, Message, MessageRole, StreamEvent};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
