//! Error types for the classroom

use thiserror::Error;

/// Result type alias for classroom operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the classroom
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote API returned an error response
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Malformed base64 or PCM payload
    #[error("decode error: {0}")]
    Decode(String),

    /// Audio output error
    #[error("audio error: {0}")]
    Audio(String),

    /// Microphone unavailable or access denied
    #[error("microphone error: {0}")]
    Microphone(String),

    /// Live session error
    #[error("live session error: {0}")]
    Live(String),

    /// Operation not valid for the current classroom view
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
    /// Whether the remote asked us to slow down
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError {
                kind: ApiErrorKind::RateLimited,
                ..
            })
        )
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Classification of a remote API failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 429 / `RESOURCE_EXHAUSTED` / quota exceeded
    RateLimited,
    /// Authentication or permission failure
    Unauthorized,
    /// Malformed request
    InvalidRequest,
    /// Server-side failure
    Server,
    /// Anything else
    Other,
}

/// Structured error returned by the generative-language API
#[derive(Debug, Clone, Error)]
#[error("api error {status} ({kind:?}): {message}")]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Classified failure kind
    pub kind: ApiErrorKind,
    /// Message from the error body (or the raw body)
    pub message: String,
}

impl ApiError {
    /// Classify an HTTP status and response body
    ///
    /// The body is expected in the Google error shape
    /// `{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "..."}}`
    /// but any text is accepted.
    #[must_use]
    pub fn classify(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let detail = parsed.as_ref().and_then(|v| v.get("error"));

        let status_text = detail
            .and_then(|d| d.get("status"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let message = detail
            .and_then(|d| d.get("message"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| body.trim().to_string(), ToString::to_string);

        let lower = message.to_lowercase();
        let kind = if status == 429
            || status_text == "RESOURCE_EXHAUSTED"
            || lower.contains("resource_exhausted")
            || lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("quota")
        {
            ApiErrorKind::RateLimited
        } else if status == 401 || status == 403 {
            ApiErrorKind::Unauthorized
        } else if (400..500).contains(&status) {
            ApiErrorKind::InvalidRequest
        } else if (500..600).contains(&status) {
            ApiErrorKind::Server
        } else {
            ApiErrorKind::Other
        };

        Self {
            status,
            kind,
            message,
        }
    }
}
