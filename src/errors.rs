use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured validation error raised before a request leaves the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}: {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// The API key could not be exchanged for a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationError {
    /// HTTP status of the login call, when the backend answered.
    pub status: Option<u16>,
    pub message: String,
    /// Raw login response body for debugging (when available).
    pub raw_body: Option<String>,
}

impl AuthenticationError {
    /// Login endpoint answered with a non-success status.
    pub(crate) fn rejected(status: StatusCode, body: String) -> Self {
        let status_text = status.canonical_reason().unwrap_or("request failed");
        Self {
            status: Some(status.as_u16()),
            message: format!("login rejected: {status_text}"),
            raw_body: (!body.trim().is_empty()).then_some(body),
        }
    }

    /// Login succeeded at the HTTP level but carried no usable `access_token`.
    pub(crate) fn missing_token(body: String) -> Self {
        Self {
            status: None,
            message: format!("failed to obtain access token. Response: {body}"),
            raw_body: Some(body),
        }
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "authentication failed ({}): {}", status, self.message),
            None => write!(f, "authentication failed: {}", self.message),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Non-success response returned by the Belake API for a dispatched call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamError {
    pub status: u16,
    /// Canonical reason phrase for `status`.
    pub status_text: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Raw response body for debugging (when available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl UpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("request failed")
            .to_string();
        Self {
            status,
            status_text,
            message: message.into(),
            request_id: None,
            raw_body: None,
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message == self.status_text {
            write!(f, "{} {}", self.status, self.status_text)
        } else {
            write!(f, "{} {}: {}", self.status, self.status_text, self.message)
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Convenience alias for fallible client results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Transport-level error (timeouts, DNS/TLS/connectivity).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl TransportError {
    pub(crate) fn connect(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self {
            kind: TransportErrorKind::Connect,
            message: message.into(),
            source: Some(source),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self {
            kind,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Broad transport error kinds for classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Other => "transport",
        };
        write!(f, "{label}")
    }
}

/// Unified error type surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration, including a registry miss.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Authentication(#[from] AuthenticationError),

    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status attached to the error, if the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Upstream(err) => Some(err.status),
            Error::Authentication(err) => err.status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.into())
    }
}
