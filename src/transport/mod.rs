//! HTTP transport to the WALL-E service.

pub mod http;

pub use http::HttpTransport;

use crate::types::ChatRequest;
use crate::{BoxStream, Result};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// The chat completion endpoint, as seen by the session layer.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a streaming chat request and return the raw response body.
    async fn open_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Bytes>>;
}

#[async_trait]
impl ChatApi for HttpTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Bytes>> {
        self.chat_stream(request).await
    }
}
