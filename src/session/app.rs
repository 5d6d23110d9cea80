use super::state::{SessionEvent, SessionState};
use crate::config::{AppConfig, ClientConfig};
use crate::store::{ChatStore, RemoteChatStore};
use crate::streaming::{CancelHandle, StreamEnd, StreamOutcome, StreamSink, StreamStatus, StreamingChatConsumer};
use crate::transport::{ChatApi, HttpTransport};
use crate::types::{Chat, ChatRequest, ChatSummary, Message};
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Application context of one client session.
///
/// Holds the loaded chats, the current-chat pointer and the per-chat send
/// state. All mutation goes through its methods; sending takes `&mut self`,
/// so one `ChatApp` never drives two replies at once.
pub struct ChatApp {
    api: Arc<dyn ChatApi>,
    store: Arc<dyn ChatStore>,
    app_config: AppConfig,
    default_max_tokens: u32,
    chats: HashMap<String, Chat>,
    summaries: Vec<ChatSummary>,
    current: Option<String>,
    sessions: HashMap<String, SessionState>,
    cancel: CancelHandle,
}

impl ChatApp {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<dyn ChatStore>,
        app_config: AppConfig,
        default_max_tokens: u32,
    ) -> Self {
        Self {
            api,
            store,
            app_config,
            default_max_tokens,
            chats: HashMap::new(),
            summaries: Vec::new(),
            current: None,
            sessions: HashMap::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Wire an app against a WALL-E server.
    ///
    /// The remote `/api/config` document is fetched once; if that fails the
    /// built-in defaults are used.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let default_max_tokens = config.max_tokens;
        let transport = Arc::new(HttpTransport::new(config)?);
        let app_config = match transport.app_config().await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "could not load remote config, using defaults");
                AppConfig::default()
            }
        };
        let store = Arc::new(RemoteChatStore::new(transport.clone()));
        Ok(Self::new(transport, store, app_config, default_max_tokens))
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn summaries(&self) -> &[ChatSummary] {
        &self.summaries
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        self.current.as_ref().and_then(|id| self.chats.get(id))
    }

    pub fn session_state(&self, chat_id: &str) -> SessionState {
        self.sessions.get(chat_id).cloned().unwrap_or_default()
    }

    /// Refresh the sidebar list from the store.
    pub async fn load_chats(&mut self) -> Result<&[ChatSummary]> {
        self.summaries = self.store.list().await?;
        Ok(&self.summaries)
    }

    /// Create, persist and select an empty chat.
    pub async fn new_chat(&mut self, model: Option<&str>) -> Result<&Chat> {
        let model = self.app_config.resolve_model(model).to_string();
        let chat = self.store.save(&Chat::new(model)).await?;
        info!(chat_id = %chat.id, model = %chat.model, "new chat");

        self.summaries.insert(0, chat.summary());
        let id = chat.id.clone();
        self.chats.insert(id.clone(), chat);
        self.current = Some(id.clone());
        self.loaded(&id)
    }

    /// Load a chat from the store and select it.
    pub async fn open_chat(&mut self, chat_id: &str) -> Result<&Chat> {
        let chat = self
            .store
            .get(chat_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat {chat_id}")))?;
        self.chats.insert(chat_id.to_string(), chat);
        self.current = Some(chat_id.to_string());
        self.loaded(chat_id)
    }

    pub async fn delete_chat(&mut self, chat_id: &str) -> Result<()> {
        if self.session_state(chat_id).is_streaming() {
            return Err(Error::SessionBusy {
                chat_id: chat_id.to_string(),
            });
        }
        self.store.delete(chat_id).await?;
        self.chats.remove(chat_id);
        self.sessions.remove(chat_id);
        self.summaries.retain(|s| s.id != chat_id);
        if self.current.as_deref() == Some(chat_id) {
            self.current = None;
        }
        Ok(())
    }

    pub async fn set_pinned(&mut self, chat_id: &str, pinned: bool) -> Result<()> {
        self.update_chat(chat_id, |chat| {
            chat.pinned = pinned;
            Ok(())
        })
        .await
    }

    pub async fn rename_chat(&mut self, chat_id: &str, title: &str) -> Result<()> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(Error::invalid_request_with_context(
                "title must not be empty",
                ErrorContext::new().with_field_path("chat.title"),
            ));
        }
        self.update_chat(chat_id, move |chat| {
            chat.title = title;
            Ok(())
        })
        .await
    }

    /// Like (`Some(true)`), dislike (`Some(false)`) or clear the rating of a message.
    pub async fn rate_message(&mut self, chat_id: &str, index: usize, liked: Option<bool>) -> Result<()> {
        self.update_chat(chat_id, |chat| {
            let message = chat.messages.get_mut(index).ok_or_else(|| {
                Error::invalid_request_with_context(
                    format!("no message at index {index}"),
                    ErrorContext::new().with_field_path("chat.messages"),
                )
            })?;
            message.liked = liked;
            Ok(())
        })
        .await
    }

    /// Clear an error shown for `chat_id`.
    pub fn acknowledge_error(&mut self, chat_id: &str) -> Result<()> {
        self.sessions
            .entry(chat_id.to_string())
            .or_default()
            .apply(SessionEvent::Acknowledge)
    }

    /// Mark the chat idle after its send future was dropped mid-stream.
    ///
    /// Dropping the future releases the transport but cannot update the state
    /// machine; call this afterwards. No-op unless the chat is streaming.
    pub fn abandon(&mut self, chat_id: &str) {
        if let Some(state) = self.sessions.get_mut(chat_id) {
            if state.is_streaming() {
                // Streaming --Cancel--> Idle is always legal.
                let _ = state.apply(SessionEvent::Cancel);
                info!(chat_id, "abandoned in-flight reply");
            }
        }
    }

    /// Handle that stops the reply driven by [`send_message`](Self::send_message).
    ///
    /// Only a cancel issued while a send is running counts: a handle that
    /// already fired is replaced by a fresh one when the next send starts and
    /// again when a send ends.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Send `prompt` in the current chat and stream the reply into `sink`.
    pub async fn send_message<S>(&mut self, prompt: &str, sink: &mut S) -> Result<StreamOutcome>
    where
        S: StreamSink + ?Sized,
    {
        if self.cancel.is_cancelled() {
            self.cancel = CancelHandle::new();
        }
        let cancel = self.cancel.clone();
        let result = self.send_message_with_cancel(prompt, sink, cancel).await;
        if self.cancel.is_cancelled() {
            self.cancel = CancelHandle::new();
        }
        result
    }

    /// [`send_message`](Self::send_message) that stops when `cancel` fires.
    ///
    /// On success the assistant reply is appended and the chat persisted. A
    /// cancelled reply keeps the user turn and drops the partial answer. On a
    /// transport or server failure an `Error: ...` assistant message is
    /// persisted instead, the chat moves to `Erroring`, and the error is returned.
    pub async fn send_message_with_cancel<S>(
        &mut self,
        prompt: &str,
        sink: &mut S,
        cancel: CancelHandle,
    ) -> Result<StreamOutcome>
    where
        S: StreamSink + ?Sized,
    {
        let chat_id = self.current.clone().ok_or_else(|| {
            Error::invalid_request_with_context("no chat selected", ErrorContext::new().with_source("chat_app"))
        })?;
        if self.session_state(&chat_id).is_streaming() {
            return Err(Error::SessionBusy { chat_id });
        }

        let request = {
            let chat = self.loaded(&chat_id)?;
            let max_tokens = self
                .app_config
                .max_tokens_for(&chat.model)
                .unwrap_or(self.default_max_tokens);
            ChatRequest::streaming(prompt, chat.model.clone(), chat.history(), max_tokens)?
        };

        self.sessions
            .entry(chat_id.clone())
            .or_default()
            .apply(SessionEvent::Send)?;
        if let Some(chat) = self.chats.get_mut(&chat_id) {
            chat.title_from_prompt(&request.prompt);
            chat.push(Message::user(request.prompt.clone()));
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.api.open_stream(&request) => Some(opened),
        };

        let result = match opened {
            None => {
                info!(chat_id = %chat_id, "reply cancelled before the stream opened");
                let outcome = StreamOutcome::cancelled();
                sink.on_end(StreamEnd::Finished(&outcome)).await;
                Ok(outcome)
            }
            Some(Ok(source)) => {
                StreamingChatConsumer::new(request.model.clone(), &request.prompt)
                    .with_cancel(cancel)
                    .consume(source, sink)
                    .await
            }
            Some(Err(e)) => {
                sink.on_end(StreamEnd::Failed(&e)).await;
                Err(e)
            }
        };

        self.finish_send(&chat_id, result).await
    }

    async fn finish_send(&mut self, chat_id: &str, result: Result<StreamOutcome>) -> Result<StreamOutcome> {
        let state = self.sessions.entry(chat_id.to_string()).or_default();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let shown = e.user_message();
                state.apply(SessionEvent::Fail(shown.clone()))?;
                if let Some(chat) = self.chats.get_mut(chat_id) {
                    chat.push(Message::assistant(shown));
                }
                if let Err(save_err) = self.persist(chat_id).await {
                    warn!(chat_id, error = %save_err, "could not persist failed reply");
                }
                return Err(e);
            }
        };

        match outcome.status {
            StreamStatus::Completed | StreamStatus::Incomplete => {
                if outcome.status == StreamStatus::Incomplete {
                    warn!(chat_id, deltas = outcome.deltas, "reply stream ended without completion, keeping partial reply");
                }
                state.apply(SessionEvent::Complete)?;
                if outcome.is_completed() || !outcome.response.is_empty() {
                    if let Some(chat) = self.chats.get_mut(chat_id) {
                        chat.push(Message::assistant(outcome.response.clone()));
                    }
                }
            }
            StreamStatus::Cancelled => {
                state.apply(SessionEvent::Cancel)?;
            }
        }

        self.persist(chat_id).await?;
        Ok(outcome)
    }

    async fn persist(&mut self, chat_id: &str) -> Result<()> {
        let chat = self.loaded(chat_id)?;
        let saved = self.store.save(chat).await?;
        let summary = saved.summary();
        match self.summaries.iter_mut().find(|s| s.id == summary.id) {
            Some(existing) => *existing = summary,
            None => self.summaries.insert(0, summary),
        }
        self.chats.insert(chat_id.to_string(), saved);
        Ok(())
    }

    async fn update_chat<F>(&mut self, chat_id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Chat) -> Result<()>,
    {
        if !self.chats.contains_key(chat_id) {
            let chat = self
                .store
                .get(chat_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("chat {chat_id}")))?;
            self.chats.insert(chat_id.to_string(), chat);
        }
        if let Some(chat) = self.chats.get_mut(chat_id) {
            mutate(chat)?;
        }
        self.persist(chat_id).await
    }

    fn loaded(&self, chat_id: &str) -> Result<&Chat> {
        self.chats
            .get(chat_id)
            .ok_or_else(|| Error::NotFound(format!("chat {chat_id}")))
    }
}
