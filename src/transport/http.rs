use super::TransportError;
use crate::config::{ApiStatus, AppConfig, ClientConfig};
use crate::types::{ChatRequest, CompletionResponse};
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::{Method, Proxy, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const CHAT_PATH: &str = "/api/chat";

pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        // Streamed replies may run longer than `timeout`; it bounds connects, plain requests and read gaps.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        if let Some(proxy_url) = &config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.config.endpoint(path)?;
        let mut req = self.client.request(method, url);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        Ok(req)
    }

    /// Issue a streaming chat request and hand back the raw body stream.
    ///
    /// A non-2xx answer is an error here, before any byte is streamed. The
    /// configured timeout bounds the wait for the response head and each gap
    /// between body chunks, not the length of the whole reply.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Bytes>> {
        debug!(model = %request.model, history = request.chat_history.len(), "POST {}", CHAT_PATH);
        let send = self
            .request(Method::POST, CHAT_PATH)?
            .header("accept", "text/event-stream")
            .json(request)
            .send();
        let resp = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| idle_timeout_error(self.config.timeout))?
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        let resp = check_status(resp, CHAT_PATH).await?;

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(with_idle_timeout(Box::pin(byte_stream), self.config.timeout))
    }

    /// Non-streaming chat request.
    pub async fn chat(&self, request: &ChatRequest) -> Result<CompletionResponse> {
        let body = request.clone().into_blocking();
        self.send_json(Method::POST, CHAT_PATH, &body).await
    }

    /// `GET /api`
    pub async fn api_status(&self) -> Result<ApiStatus> {
        self.get_json("/api").await
    }

    /// `GET /api/config`
    pub async fn app_config(&self) -> Result<AppConfig> {
        self.get_json("/api/config").await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .request(Method::GET, path)?
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        read_json(check_status(resp, path).await?).await
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .request(method, path)?
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        read_json(check_status(resp, path).await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, path)?
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        check_status(resp, path).await?;
        Ok(())
    }
}

/// Fail the body stream when no chunk arrives within `idle`.
fn with_idle_timeout(body: BoxStream<'static, Bytes>, idle: Duration) -> BoxStream<'static, Bytes> {
    let stream = stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(item)) => Some((item, Some(body))),
            Ok(None) => None,
            Err(_) => Some((Err(idle_timeout_error(idle)), None)),
        }
    });
    Box::pin(stream)
}

fn idle_timeout_error(idle: Duration) -> Error {
    Error::Transport(TransportError::Other(format!(
        "no data from the chat service for {:.1}s",
        idle.as_secs_f64()
    )))
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp
        .bytes()
        .await
        .map_err(|e| Error::Transport(TransportError::Http(e)))?;
    Ok(serde_json::from_slice(&body)?)
}

async fn check_status(resp: Response, path: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(path.to_string()));
    }

    let body = resp.text().await.unwrap_or_default();
    Err(Error::Remote {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// The service answers errors as `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .or_else(|| v.get("message").and_then(|m| m.as_str()))
    });
    match message {
        Some(m) => m.to_string(),
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.trim().to_string(),
    }
}
