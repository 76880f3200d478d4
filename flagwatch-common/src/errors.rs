//! Error taxonomy for flag evaluation.
//!
//! | Type              | Raised by   | Recovered by                          |
//! |-------------------|-------------|---------------------------------------|
//! | `TransportError`  | transport   | fallback, `state = Error`             |
//! | `NormalizeError`  | normalizer  | fallback, `state = Error`             |
//!
//! None of these ever reach the HTTP boundary.

use thiserror::Error;

/// Failures while talking to the flag service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned non-success status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// Whether the service could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }

    /// HTTP status returned by the service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a reqwest failure for `url`.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                message: error_chain(err),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                url,
                status: status.as_u16(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body {
                url,
                message: error_chain(err),
            }
        } else {
            Self::Request {
                url,
                message: error_chain(err),
            }
        }
    }
}

/// Failures while interpreting a response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Body was empty, not JSON, or not a JSON object.
    #[error("failed to decode flag response: {0}")]
    Decode(String),

    /// Body decoded but carried none of the recognized fields.
    #[error("flag response had neither {expected} (got fields: {found})")]
    AmbiguousResponse { expected: String, found: String },
}

/// Anything that stops a snapshot from being computed normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl EvaluationError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_unreachable())
    }
}

/// Render an error and its sources on one line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
