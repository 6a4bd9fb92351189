//! HTTP transport: POST the message, stream back the SSE body.

use super::transport::{read_error, ByteStream, ChatRequest, RequestBody, Transport};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Fallback message for failed requests without a usable body.
const REQUEST_FAILED: &str = "Stream request failed";

/// Connection settings for the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Backend root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub access_token: Option<String>,
    /// Time allowed for establishing the connection.
    #[serde(with = "crate::config::millis")]
    pub connect_timeout: Duration,
    /// User agent header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            access_token: None,
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("trickle/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpTransport {
    /// Build a transport from its configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| IngestError::InvalidConfig(format!("base_url {:?}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(IngestError::InvalidConfig(format!(
                "base_url {:?} cannot be a base",
                config.base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| IngestError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    /// Full URL for a request.
    pub fn url_for(&self, request: &ChatRequest) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            request.endpoint()
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.url_for(request);
        debug!(%url, mode = ?request.mode, "opening chat stream");

        let mut builder = self.client.post(&url).json(&RequestBody::from(request));
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| IngestError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            let message = error_message(body.as_ref());
            warn!(status = status.as_u16(), %message, "chat stream refused");

            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                IngestError::RateLimited(message)
            } else {
                IngestError::Status {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(read_error))
            .boxed())
    }
}

/// Pull a human-readable message out of an error response body.
fn error_message(body: Option<&Value>) -> String {
    body.and_then(|v| {
        ["detail", "error", "message"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str))
    })
    .filter(|m| !m.trim().is_empty())
    .map_or_else(|| REQUEST_FAILED.to_string(), str::to_string)
}
