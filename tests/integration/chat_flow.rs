//! End-to-end send flow through `ChatApp`

use super::mock_server::MockServerFixture;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use walle_client::streaming::SinkRecord;
use walle_client::transport::TransportError;
use walle_client::{
    AppConfig, BoxStream, CancelHandle, ChatApi, ChatApp, ChatRequest, ChatStore, Error, InMemoryChatStore,
    MessageRole, RecordingSink, SessionState, StreamEnd, StreamSink, StreamStatus,
};

/// One scripted answer of [`ScriptedApi`].
enum Reply {
    Chunks(Vec<&'static str>),
    FailAfter(Vec<&'static str>, &'static str),
    Reject(u16, &'static str),
    Pending,
    /// The response head never arrives.
    Stall,
}

/// `ChatApi` that answers requests from a script and records them.
#[derive(Default)]
struct ScriptedApi {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedApi {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn open_stream(&self, request: &ChatRequest) -> walle_client::Result<BoxStream<'static, Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front().expect("unscripted request");

        let chunks = |parts: Vec<&'static str>| {
            parts
                .into_iter()
                .map(|p| Ok::<Bytes, Error>(Bytes::from_static(p.as_bytes())))
        };
        match reply {
            Reply::Chunks(parts) => Ok(Box::pin(futures::stream::iter(chunks(parts).collect::<Vec<_>>()))),
            Reply::FailAfter(parts, reason) => {
                let mut items: Vec<walle_client::Result<Bytes>> = chunks(parts).collect();
                items.push(Err(Error::Transport(TransportError::Other(reason.to_string()))));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Reply::Reject(status, message) => Err(Error::Remote {
                status,
                message: message.to_string(),
            }),
            Reply::Pending => Ok(Box::pin(futures::stream::pending())),
            Reply::Stall => futures::future::pending().await,
        }
    }
}

fn app_with(api: Arc<ScriptedApi>) -> (ChatApp, Arc<InMemoryChatStore>) {
    let store = Arc::new(InMemoryChatStore::new());
    let app = ChatApp::new(api, store.clone(), AppConfig::default(), 4000);
    (app, store)
}

#[tokio::test]
async fn completed_reply_is_persisted() {
    let api = ScriptedApi::new(vec![Reply::Chunks(vec![
        "data: {\"content\":\"Hi \"}\n",
        "data: {\"content\":\"there\"}\ndata: {\"done\":true}\n",
    ])]);
    let (mut app, store) = app_with(api.clone());
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let mut sink = RecordingSink::new();
    let outcome = app.send_message("  hello WALL-E  ", &mut sink).await.unwrap();

    assert_eq!(outcome.response, "Hi there");
    assert_eq!(sink.deltas(), vec!["Hi ", "there"]);
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);

    assert_eq!(store.len().await, 1);
    let stored = store.get(&chat_id).await.unwrap().unwrap();
    assert_eq!(stored.title, "hello WALL-E");
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[0].role, MessageRole::User);
    assert_eq!(stored.messages[0].content, "hello WALL-E");
    assert_eq!(stored.messages[1].role, MessageRole::Assistant);
    assert_eq!(stored.messages[1].content, "Hi there");

    let request = &api.requests()[0];
    assert!(request.stream);
    assert_eq!(request.model, "openai/gpt-4o-mini");
    assert!(request.chat_history.is_empty());
}

#[tokio::test]
async fn second_turn_carries_history() {
    let api = ScriptedApi::new(vec![
        Reply::Chunks(vec!["data: {\"content\":\"one\"}\ndata: {\"done\":true}\n"]),
        Reply::Chunks(vec!["data: {\"content\":\"two\"}\ndata: {\"done\":true}\n"]),
    ]);
    let (mut app, _store) = app_with(api.clone());
    app.new_chat(None).await.unwrap();

    app.send_message("first", &mut RecordingSink::new()).await.unwrap();
    app.send_message("second", &mut RecordingSink::new()).await.unwrap();

    let history = &api.requests()[1].chat_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "first");
    assert_eq!(history[1].content, "one");
    assert_eq!(app.current_chat().unwrap().messages.len(), 4);
}

#[tokio::test]
async fn transport_failure_persists_error_message() {
    let api = ScriptedApi::new(vec![Reply::FailAfter(
        vec!["data: {\"content\":\"par\"}\n", "data: {\"content\":\"tial\"}\n"],
        "connection reset",
    )]);
    let (mut app, store) = app_with(api);
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let mut sink = RecordingSink::new();
    let err = app.send_message("hello", &mut sink).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(sink.deltas(), vec!["par", "tial"]);
    assert!(matches!(sink.records.last(), Some(SinkRecord::Failed(_))));
    assert!(matches!(app.session_state(&chat_id), SessionState::Erroring { .. }));

    let stored = store.get(&chat_id).await.unwrap().unwrap();
    let last = stored.messages.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert!(last.content.starts_with("Error: "));
    assert!(last.content.contains("connection reset"));

    app.acknowledge_error(&chat_id).unwrap();
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
}

#[tokio::test]
async fn rejected_request_reports_server_message() {
    let api = ScriptedApi::new(vec![Reply::Reject(500, "model unavailable")]);
    let (mut app, _store) = app_with(api);
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let mut sink = RecordingSink::new();
    let err = app.send_message("hello", &mut sink).await.unwrap_err();

    assert!(matches!(err, Error::Remote { status: 500, .. }));
    assert_eq!(sink.end_count(), 1);
    assert_eq!(
        app.session_state(&chat_id),
        SessionState::Erroring {
            reason: "Error: server returned 500: model unavailable".into()
        }
    );
}

#[tokio::test]
async fn erroring_chat_can_send_again() {
    let api = ScriptedApi::new(vec![
        Reply::Reject(502, "bad gateway"),
        Reply::Chunks(vec!["data: {\"content\":\"ok\"}\ndata: {\"done\":true}\n"]),
    ]);
    let (mut app, _store) = app_with(api);
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    assert!(app.send_message("a", &mut RecordingSink::new()).await.is_err());
    let outcome = app.send_message("b", &mut RecordingSink::new()).await.unwrap();
    assert_eq!(outcome.response, "ok");
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
}

/// Cancels once the first delta has been shown.
struct CancelAfterFirst(CancelHandle, RecordingSink);

#[async_trait]
impl StreamSink for CancelAfterFirst {
    async fn on_delta(&mut self, delta: &str, accumulated: &str) {
        self.0.cancel();
        self.1.on_delta(delta, accumulated).await;
    }

    async fn on_end(&mut self, end: StreamEnd<'_>) {
        self.1.on_end(end).await;
    }
}

#[tokio::test]
async fn cancelled_reply_keeps_user_turn_only() {
    let api = ScriptedApi::new(vec![Reply::Chunks(vec![
        "data: {\"content\":\"never \"}\n",
        "data: {\"content\":\"shown\"}\ndata: {\"done\":true}\n",
    ])]);
    let (mut app, store) = app_with(api);
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let cancel = CancelHandle::new();
    let mut sink = CancelAfterFirst(cancel.clone(), RecordingSink::new());
    let outcome = app.send_message_with_cancel("stop me", &mut sink, cancel).await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Cancelled);
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
    let stored = store.get(&chat_id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].content, "stop me");
}

#[tokio::test]
async fn app_cancel_handle_stops_reply_and_rearms() {
    let api = ScriptedApi::new(vec![
        Reply::Chunks(vec!["data: {\"content\":\"a\"}\n", "data: {\"done\":true}\n"]),
        Reply::Chunks(vec!["data: {\"content\":\"b\"}\ndata: {\"done\":true}\n"]),
    ]);
    let (mut app, _store) = app_with(api);
    app.new_chat(None).await.unwrap();

    let mut sink = CancelAfterFirst(app.cancel_handle(), RecordingSink::new());
    let outcome = app.send_message("first", &mut sink).await.unwrap();
    assert_eq!(outcome.status, StreamStatus::Cancelled);
    assert!(!app.cancel_handle().is_cancelled());

    let outcome = app.send_message("second", &mut RecordingSink::new()).await.unwrap();
    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.response, "b");
}

#[tokio::test]
async fn cancel_while_idle_does_not_affect_next_send() {
    let api = ScriptedApi::new(vec![Reply::Chunks(vec![
        "data: {\"content\":\"hello back\"}\ndata: {\"done\":true}\n",
    ])]);
    let (mut app, store) = app_with(api.clone());
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    app.cancel_handle().cancel();
    let outcome = app.send_message("hello", &mut RecordingSink::new()).await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.response, "hello back");
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(&chat_id).await.unwrap().unwrap().messages.len(), 2);
    assert!(!app.cancel_handle().is_cancelled());
}

#[tokio::test]
async fn cancel_while_waiting_for_response_head() {
    let api = ScriptedApi::new(vec![Reply::Stall]);
    let (mut app, store) = app_with(api.clone());
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut sink = RecordingSink::new();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        app.send_message_with_cancel("anyone there?", &mut sink, cancel),
    )
    .await
    .expect("send waited for the response head after cancel")
    .unwrap();

    assert_eq!(outcome.status, StreamStatus::Cancelled);
    assert_eq!(sink.records, vec![SinkRecord::Finished(StreamStatus::Cancelled)]);
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    let stored = store.get(&chat_id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].content, "anyone there?");
}

#[tokio::test]
async fn incomplete_reply_keeps_partial_text() {
    let api = ScriptedApi::new(vec![Reply::Chunks(vec!["data: {\"content\":\"half an answ\"}\n"])]);
    let (mut app, store) = app_with(api);
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let outcome = app.send_message("go", &mut RecordingSink::new()).await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Incomplete);
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
    let stored = store.get(&chat_id).await.unwrap().unwrap();
    assert_eq!(stored.messages.last().unwrap().content, "half an answ");
}

#[tokio::test]
async fn busy_chat_rejects_second_send() {
    let api = ScriptedApi::new(vec![Reply::Pending]);
    let (mut app, _store) = app_with(api.clone());
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let mut sink = RecordingSink::new();
    let pending = tokio::time::timeout(Duration::from_millis(50), app.send_message("slow", &mut sink)).await;
    assert!(pending.is_err());
    assert_eq!(app.session_state(&chat_id), SessionState::Streaming);

    let err = app.send_message("again", &mut RecordingSink::new()).await.unwrap_err();
    assert!(matches!(err, Error::SessionBusy { .. }));
    assert!(matches!(app.delete_chat(&chat_id).await, Err(Error::SessionBusy { .. })));
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);

    app.abandon(&chat_id);
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
}

#[tokio::test]
async fn send_without_chat_is_rejected() {
    let (mut app, _store) = app_with(ScriptedApi::new(vec![]));
    let err = app.send_message("hi", &mut RecordingSink::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn blank_prompt_does_not_start_a_reply() {
    let api = ScriptedApi::new(vec![]);
    let (mut app, _store) = app_with(api.clone());
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    let err = app.send_message("   ", &mut RecordingSink::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }));
    assert_eq!(app.session_state(&chat_id), SessionState::Idle);
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    assert!(app.current_chat().unwrap().messages.is_empty());
}

#[tokio::test]
async fn pin_rename_and_rate() {
    let api = ScriptedApi::new(vec![Reply::Chunks(vec!["data: {\"content\":\"yes\"}\ndata: {\"done\":true}\n"])]);
    let (mut app, store) = app_with(api);
    let chat_id = app.new_chat(None).await.unwrap().id.clone();
    app.send_message("question", &mut RecordingSink::new()).await.unwrap();

    app.set_pinned(&chat_id, true).await.unwrap();
    app.rename_chat(&chat_id, "  Renamed  ").await.unwrap();
    app.rate_message(&chat_id, 1, Some(false)).await.unwrap();

    let stored = store.get(&chat_id).await.unwrap().unwrap();
    assert!(stored.pinned);
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.messages[1].liked, Some(false));
    assert!(app.summaries().iter().any(|s| s.id == chat_id && s.pinned));

    assert!(app.rename_chat(&chat_id, " ").await.is_err());
    assert!(app.rate_message(&chat_id, 9, Some(true)).await.is_err());
}

#[tokio::test]
async fn delete_removes_chat_everywhere() {
    let (mut app, store) = app_with(ScriptedApi::new(vec![]));
    let chat_id = app.new_chat(None).await.unwrap().id.clone();

    app.delete_chat(&chat_id).await.unwrap();

    assert!(app.current_chat().is_none());
    assert!(app.summaries().is_empty());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn connect_and_chat_against_server() {
    let fixture = MockServerFixture::new().await;
    let _config = fixture
        .mock_json(
            "GET",
            "/api/config",
            200,
            r#"{"models": {"available_models": {"anthropic/claude-3-haiku": {"name": "Claude 3 Haiku", "max_tokens": 1024}}, "default_model": "anthropic/claude-3-haiku"}}"#,
        )
        .await;
    let chat_json = r#"{"id": "srv-1", "title": "New Chat", "model": "anthropic/claude-3-haiku", "created_at": "2024-05-01 10:00:00", "messages": []}"#;
    let _put = fixture
        .mock_json_matching("PUT", r"^/api/chats/.+$", 404, r#"{"error": "Chat not found"}"#)
        .await;
    let _post = fixture.mock_json("POST", "/api/chats", 201, chat_json).await;
    let stream = fixture
        .mock_chat_stream(&[
            r#"{"content": "Beep "}"#,
            r#"{"content": "boop"}"#,
            "[DONE]",
            r#"{"done": true, "full_response": "Beep boop"}"#,
        ])
        .await;

    let mut app = ChatApp::connect(fixture.config()).await.unwrap();
    let chat = app.new_chat(None).await.unwrap();
    assert_eq!(chat.id, "srv-1");
    assert_eq!(chat.model, "anthropic/claude-3-haiku");

    let mut sink = RecordingSink::new();
    let outcome = app.send_message("hi robot", &mut sink).await.unwrap();

    stream.assert_async().await;
    assert_eq!(outcome.response, "Beep boop");
    assert_eq!(outcome.full_response.as_deref(), Some("Beep boop"));
    assert_eq!(sink.deltas(), vec!["Beep ", "boop"]);
}
