//! Session control: the per-chat send state machine and the application
//! context that owns chats and drives replies.

pub mod app;
pub mod state;

pub use app::ChatApp;
pub use state::{SessionEvent, SessionState};
