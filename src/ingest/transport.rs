//! Transport boundary: how a chat request becomes a byte stream.

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Incrementally readable response body.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Backend-assigned identifier of a conversation.
///
/// Treated as opaque. The backend sends integers today; strings are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ContextId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ContextId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Self(id.to_string()),
            Raw::Text(id) => Self(id),
        })
    }
}

/// Which assistant pipeline answers the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Plain conversation.
    #[default]
    General,
    /// Answers grounded in uploaded documents.
    Document,
}

/// One message to send to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Existing conversation, or `None` to start a new one.
    pub context: Option<ContextId>,
    /// Answering mode.
    pub mode: ChatMode,
}

impl ChatRequest {
    /// A general-mode message in a new conversation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            mode: ChatMode::General,
        }
    }

    /// Continue an existing conversation.
    #[must_use]
    pub fn in_context(mut self, context: ContextId) -> Self {
        self.context = Some(context);
        self
    }

    /// Choose the answering mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }

    /// Endpoint path for this request.
    pub fn endpoint(&self) -> String {
        match &self.context {
            Some(context) => format!("/api/chat/send/{context}/"),
            None => "/api/chat/send/".to_string(),
        }
    }
}

/// Wire body of a chat request.
#[derive(Debug, Serialize)]
pub(crate) struct RequestBody<'a> {
    pub message: &'a str,
    pub chat_type: ChatMode,
}

impl<'a> From<&'a ChatRequest> for RequestBody<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            message: &request.message,
            chat_type: request.mode,
        }
    }
}

/// Something that can open a response stream for a chat request.
///
/// Aborting is done by dropping the returned stream.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Issue the request and return its body as a byte stream.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// Turn a transport error message into an [`IngestError::Read`].
pub(crate) fn read_error(err: impl fmt::Display) -> IngestError {
    IngestError::Read(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_from_int_or_string() {
        let from_int: ContextId = serde_json::from_str("42").unwrap();
        let from_str: ContextId = serde_json::from_str(r#""abc-1""#).unwrap();
        assert_eq!(from_int, ContextId::from(42));
        assert_eq!(from_str.as_str(), "abc-1");
    }

    #[test]
    fn test_request_endpoint() {
        let fresh = ChatRequest::new("hello");
        assert_eq!(fresh.endpoint(), "/api/chat/send/");

        let existing = ChatRequest::new("hello").in_context(ContextId::from(7));
        assert_eq!(existing.endpoint(), "/api/chat/send/7/");
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest::new("what is in the report?").with_mode(ChatMode::Document);
        let body = serde_json::to_value(RequestBody::from(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"message": "what is in the report?", "chat_type": "document"})
        );
    }
}
