use std::fmt;
use std::path::PathBuf;

use backend_channel::BackendError;
use reqwest::StatusCode;
use serde::Deserialize;

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug)]
pub enum HttpBackendError {
    InvalidConfig(String),
    ConfigRead { path: PathBuf, message: String },
    Client(reqwest::Error),
    Unreachable { endpoint: String, message: String },
    Timeout(String),
    Status(StatusCode, String),
    InvalidReply { message: String, body_preview: String },
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    Runtime(String),
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

impl fmt::Display for HttpBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(message) => write!(f, "invalid HTTP backend config: {message}"),
            Self::ConfigRead { path, message } => {
                write!(f, "failed to read {}: {message}", path.display())
            }
            Self::Client(error) => write!(f, "HTTP client error: {error}"),
            Self::Unreachable { endpoint, message } => {
                write!(f, "cannot reach {endpoint}: {message}")
            }
            Self::Timeout(message) => write!(f, "request timed out: {message}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::InvalidReply {
                message,
                body_preview,
            } => write!(f, "reply is not valid JSON ({message}): {body_preview}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                let last_error = last_error.as_deref().unwrap_or("none");
                write!(
                    f,
                    "retries exhausted (status: {status}, last error: {last_error})"
                )
            }
            Self::Runtime(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for HttpBackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HttpBackendError {
    fn from(error: reqwest::Error) -> Self {
        Self::Client(error)
    }
}

impl HttpBackendError {
    pub(crate) fn invalid_reply(error: &serde_json::Error, body: &str) -> Self {
        Self::InvalidReply {
            message: error.to_string(),
            body_preview: preview(body),
        }
    }

    /// Maps the transport error onto the shared backend failure shape.
    pub fn into_backend_error(self) -> BackendError {
        let message = self.to_string();
        match self {
            Self::Unreachable { .. } => BackendError::unreachable(message),
            Self::Timeout(_) => BackendError::timeout(message),
            Self::InvalidReply { .. } => BackendError::protocol(message),
            Self::InvalidConfig(_)
            | Self::ConfigRead { .. }
            | Self::Client(_)
            | Self::Status(..)
            | Self::RetryExhausted { .. }
            | Self::Runtime(_) => BackendError::transport(message),
        }
    }
}

/// Extracts a readable message from an error response body.
///
/// Prefers `{"error": {"message": ...}}`, then the raw body, then the
/// status's canonical reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let explicit = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty());
    if let Some(message) = explicit {
        return message;
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        preview(body)
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{cut}...")
}
