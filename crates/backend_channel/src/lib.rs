//! Minimal transport-agnostic contract for one request to the reasoning backend.
//!
//! This crate defines only the request envelope, the opaque reply type and the
//! failure shape shared by every transport. It excludes transport details,
//! reply classification and session orchestration concerns.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Monotonic identifier of one dispatched request within a session.
pub type Generation = u64;

/// Opaque structured reply returned by the backend.
///
/// Interpreting the reply is the caller's job; transports only guarantee that
/// the payload was well-formed JSON.
pub type RawReply = Value;

/// Path and content of one file sent along with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
}

impl FileSnapshot {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Input required to ask the backend for one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRequest {
    pub prompt_text: String,
    pub active_file: FileSnapshot,
    pub context_files: Vec<FileSnapshot>,
    pub model: String,
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The backend could not be reached at all.
    Unreachable,
    /// The request reached the backend but the exchange failed.
    Transport,
    /// A backend process exited unsuccessfully or could not be spawned.
    Process,
    /// The backend did not answer within the configured deadline.
    Timeout,
    /// The backend answered with something that is not a JSON reply.
    Protocol,
}

impl BackendErrorKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unreachable => "backend unreachable",
            Self::Transport => "transport failure",
            Self::Process => "backend process failure",
            Self::Timeout => "backend timed out",
            Self::Protocol => "malformed backend reply",
        }
    }
}

/// Error returned by a transport when a request could not produce a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    /// Creates a new backend error.
    #[must_use]
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unreachable, message)
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transport, message)
    }

    #[must_use]
    pub fn process(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Process, message)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Protocol, message)
    }

    #[must_use]
    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    /// Returns the underlying error message without the kind label.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for BackendError {}

/// Immutable metadata describing a backend channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendProfile {
    pub backend_id: String,
    pub default_model: String,
}

/// Transport interface for sending one request to the reasoning backend.
pub trait BackendChannel: Send + Sync + 'static {
    /// Returns backend identity metadata.
    fn profile(&self) -> BackendProfile;

    /// Returns the model ids this backend accepts.
    fn models(&self) -> Vec<String> {
        vec![self.profile().default_model]
    }

    /// Sends a request and blocks until the backend replies or fails.
    ///
    /// Callers are expected to invoke this off the thread that owns session
    /// state; the call may take as long as the backend needs to think.
    fn send(&self, request: BackendRequest) -> Result<RawReply, BackendError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        BackendChannel, BackendError, BackendErrorKind, BackendProfile, BackendRequest,
        FileSnapshot, RawReply,
    };

    struct EchoBackend;

    impl BackendChannel for EchoBackend {
        fn profile(&self) -> BackendProfile {
            BackendProfile {
                backend_id: "echo".to_string(),
                default_model: "echo-model".to_string(),
            }
        }

        fn send(&self, request: BackendRequest) -> Result<RawReply, BackendError> {
            Ok(json!({ "type": "explanation", "content": request.prompt_text }))
        }
    }

    fn sample_request() -> BackendRequest {
        BackendRequest {
            prompt_text: "add a dropout layer".to_string(),
            active_file: FileSnapshot::new("model.py", "x = 1\n"),
            context_files: vec![FileSnapshot::new("train.py", "train()\n")],
            model: "deepseek-coder".to_string(),
        }
    }

    #[test]
    fn request_serializes_with_camel_case_wire_names() {
        let value = serde_json::to_value(sample_request()).expect("request serializes");

        assert_eq!(value["promptText"], "add a dropout layer");
        assert_eq!(value["activeFile"]["path"], "model.py");
        assert_eq!(value["activeFile"]["content"], "x = 1\n");
        assert_eq!(value["contextFiles"][0]["path"], "train.py");
        assert_eq!(value["model"], "deepseek-coder");
    }

    #[test]
    fn request_round_trips_through_wire_shape() {
        let value = json!({
            "promptText": "explain",
            "activeFile": { "path": "a.py", "content": "" },
            "contextFiles": [],
            "model": "m"
        });

        let request: BackendRequest = serde_json::from_value(value).expect("request parses");
        assert_eq!(request.prompt_text, "explain");
        assert!(request.context_files.is_empty());
    }

    #[test]
    fn backend_error_display_prefixes_kind_label() {
        let error = BackendError::unreachable("connection refused");

        assert_eq!(error.kind(), BackendErrorKind::Unreachable);
        assert_eq!(error.message(), "connection refused");
        assert_eq!(
            error.to_string(),
            "backend unreachable: connection refused"
        );
    }

    #[test]
    fn every_kind_has_a_distinct_label() {
        let labels = [
            BackendErrorKind::Unreachable,
            BackendErrorKind::Transport,
            BackendErrorKind::Process,
            BackendErrorKind::Timeout,
            BackendErrorKind::Protocol,
        ]
        .map(BackendErrorKind::label);

        for (index, label) in labels.iter().enumerate() {
            assert!(!labels[index + 1..].contains(label), "duplicate label {label}");
        }
    }

    #[test]
    fn default_models_list_contains_profile_model() {
        assert_eq!(EchoBackend.models(), vec!["echo-model".to_string()]);
    }

    #[test]
    fn send_returns_opaque_reply() {
        let reply = EchoBackend.send(sample_request()).expect("echo succeeds");
        assert_eq!(reply["type"], "explanation");
        assert_eq!(reply["content"], "add a dropout layer");
    }
}
