//! Error types for stream ingest.
//!
//! The display side has no runtime errors; everything here comes from the
//! transport or from the wire. Errors are translated into a [`Notice`] at
//! the controller boundary so the presentation layer can tell a rate limit
//! from a generic failure.

use thiserror::Error;

/// Fallback text when the server gives no usable message.
pub const GENERIC_FAILURE: &str = "Failed to get AI response";

/// Text shown when the server rate-limits the client.
pub const RATE_LIMITED: &str = "Rate limit exceeded. Please try again later.";

/// Errors raised while opening or reading a response stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The request never reached the server, or the connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status before streaming.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The server refused the request because of rate limiting (429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The stream carried an explicit error event.
    #[error("{0}")]
    Remote(String),

    /// Reading the response body failed mid-stream.
    #[error("stream read failed: {0}")]
    Read(String),

    /// The stream ended without a completion marker.
    #[error("stream ended before completion")]
    UnexpectedEof,

    /// Client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// User-facing classification of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Worth retrying later.
    RateLimited,
    /// Anything else, with a message fit for a transient notification.
    Failure(String),
}

impl Notice {
    /// Text for the notification.
    pub fn message(&self) -> &str {
        match self {
            Self::RateLimited => RATE_LIMITED,
            Self::Failure(message) => message,
        }
    }
}

impl IngestError {
    /// Classify this error for display.
    pub fn notice(&self) -> Notice {
        match self {
            Self::RateLimited(_) | Self::Status { status: 429, .. } => Notice::RateLimited,
            Self::Status { message, .. } | Self::Remote(message) => {
                if mentions_rate_limit(message) {
                    Notice::RateLimited
                } else if message.trim().is_empty() {
                    Notice::Failure(GENERIC_FAILURE.to_string())
                } else {
                    Notice::Failure(message.clone())
                }
            }
            other => Notice::Failure(other.to_string()),
        }
    }
}

/// Phrases that mark a throttling error. A bare "rate" is not one.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate-limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
];

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_rate_limited_variants() {
        assert_eq!(
            IngestError::RateLimited("slow down".into()).notice(),
            Notice::RateLimited
        );
        assert_eq!(
            IngestError::Status {
                status: 429,
                message: "Too Many Requests".into()
            }
            .notice(),
            Notice::RateLimited
        );
        assert_eq!(
            IngestError::Remote("Rate limit reached for model".into()).notice(),
            Notice::RateLimited
        );
    }

    #[test]
    fn test_notice_rate_limit_spellings() {
        for message in [
            "You have been rate-limited",
            "Ratelimited by upstream provider",
            "error code: rate_limit_exceeded",
            "Too Many Requests",
            "upstream returned 429",
        ] {
            assert_eq!(
                IngestError::Remote(message.into()).notice(),
                Notice::RateLimited,
                "{message}"
            );
        }
    }

    #[test]
    fn test_notice_generic_failure() {
        assert_eq!(
            IngestError::Remote("Failed to generate an answer".into()).notice(),
            Notice::Failure("Failed to generate an answer".into())
        );
        assert_eq!(
            IngestError::Remote(String::new()).notice().message(),
            GENERIC_FAILURE
        );
        assert_eq!(
            IngestError::UnexpectedEof.notice(),
            Notice::Failure("stream ended before completion".into())
        );
    }
}
