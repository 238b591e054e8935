// Reply transport
//
// The transport only opens the response channel and hands back its raw
// bytes; framing and decoding happen in the reader.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::errors::StreamError;

/// Raw body chunks of a reply, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// One assistant turn request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            case_id: None,
            title: None,
        }
    }

    pub fn with_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Opens the long-lived response channel for a turn
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError>;
}

/// Transport over the backend's streaming HTTP endpoint
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(backend: &BackendConfig) -> Result<Self, StreamError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StreamError::Connect(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: backend.endpoint(&backend.stream_path),
            token: backend.token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        tracing::debug!(
            "Opening reply stream at {} for session {}",
            self.url,
            request.session_id
        );

        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/x-ndjson, text/event-stream")
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| StreamError::Read(e.to_string()))
            .boxed())
    }
}
