//! Deterministic scripted implementation of the `backend_channel` contract.
//!
//! This crate contains no transport logic and is intended for local
//! development and session-level integration testing.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use backend_channel::{BackendChannel, BackendError, BackendProfile, BackendRequest, RawReply};
use serde_json::json;

/// Stable backend identifier used for explicit startup selection.
pub const MOCK_BACKEND_ID: &str = "mock";

/// One scripted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    Reply(RawReply),
    Fail(BackendError),
}

/// Scripted backend used by session tests and local runs.
///
/// Outcomes are served in the order they were queued. Once the script runs
/// dry, every request is answered with an `explanation` reply echoing the
/// prompt.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    received: Mutex<Vec<BackendRequest>>,
    model_ids: Vec<String>,
    delay: Option<Duration>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScriptedBackend {
    /// Creates a backend with an initial script and default model options.
    #[must_use]
    pub fn new(script: Vec<ScriptedOutcome>) -> Self {
        Self::with_models(script, vec!["mock".to_string(), "mock-alt".to_string()])
    }

    /// Creates a backend with explicit model options.
    #[must_use]
    pub fn with_models(script: Vec<ScriptedOutcome>, model_ids: Vec<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            received: Mutex::new(Vec::new()),
            model_ids: sanitize_model_ids(model_ids),
            delay: None,
        }
    }

    /// Sleeps for `delay` before answering each request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a successful reply.
    pub fn push_reply(&self, reply: RawReply) {
        lock_unpoisoned(&self.script).push_back(ScriptedOutcome::Reply(reply));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, error: BackendError) {
        lock_unpoisoned(&self.script).push_back(ScriptedOutcome::Fail(error));
    }

    /// Returns every request received so far, in arrival order.
    #[must_use]
    pub fn received_requests(&self) -> Vec<BackendRequest> {
        lock_unpoisoned(&self.received).clone()
    }

    #[must_use]
    pub fn remaining_outcomes(&self) -> usize {
        lock_unpoisoned(&self.script).len()
    }
}

impl BackendChannel for ScriptedBackend {
    fn profile(&self) -> BackendProfile {
        BackendProfile {
            backend_id: MOCK_BACKEND_ID.to_string(),
            default_model: self.model_ids[0].clone(),
        }
    }

    fn models(&self) -> Vec<String> {
        self.model_ids.clone()
    }

    fn send(&self, request: BackendRequest) -> Result<RawReply, BackendError> {
        let prompt = request.prompt_text.clone();
        lock_unpoisoned(&self.received).push(request);

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let next = lock_unpoisoned(&self.script).pop_front();
        match next {
            Some(ScriptedOutcome::Reply(reply)) => Ok(reply),
            Some(ScriptedOutcome::Fail(error)) => Err(error),
            None => Ok(json!({
                "type": "explanation",
                "content": format!("No scripted reply left. You asked: {prompt}"),
            })),
        }
    }
}

fn sanitize_model_ids(model_ids: Vec<String>) -> Vec<String> {
    let mut sanitized: Vec<String> = model_ids
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();

    if sanitized.is_empty() {
        sanitized.push("mock".to_string());
    }

    sanitized
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use backend_channel::{BackendErrorKind, FileSnapshot};

    use super::*;

    fn request(prompt: &str) -> BackendRequest {
        BackendRequest {
            prompt_text: prompt.to_string(),
            active_file: FileSnapshot::new("model.py", "x = 1\n"),
            context_files: Vec::new(),
            model: "mock".to_string(),
        }
    }

    #[test]
    fn profile_exposes_mock_identity_and_first_model() {
        let profile = ScriptedBackend::default().profile();

        assert_eq!(profile.backend_id, MOCK_BACKEND_ID);
        assert_eq!(profile.default_model, "mock");
    }

    #[test]
    fn scripted_outcomes_are_served_in_order() {
        let backend = ScriptedBackend::new(vec![
            ScriptedOutcome::Reply(json!({ "type": "explanation", "content": "first" })),
            ScriptedOutcome::Fail(BackendError::unreachable("connection refused")),
        ]);

        let first = backend.send(request("one")).expect("first outcome is a reply");
        assert_eq!(first["content"], "first");

        let second = backend
            .send(request("two"))
            .expect_err("second outcome is a failure");
        assert_eq!(second.kind(), BackendErrorKind::Unreachable);
        assert_eq!(backend.remaining_outcomes(), 0);
    }

    #[test]
    fn exhausted_script_echoes_prompt_as_explanation() {
        let backend = ScriptedBackend::default();

        let reply = backend.send(request("what does this do?")).expect("echo reply");

        assert_eq!(reply["type"], "explanation");
        assert!(reply["content"]
            .as_str()
            .expect("content is a string")
            .contains("what does this do?"));
    }

    #[test]
    fn received_requests_are_recorded() {
        let backend = ScriptedBackend::default();
        backend.push_reply(json!({ "type": "explanation", "content": "ok" }));

        let _ = backend.send(request("recorded"));

        let received = backend.received_requests();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].prompt_text, "recorded");
    }

    #[test]
    fn blank_model_ids_fall_back_to_mock() {
        let backend = ScriptedBackend::with_models(Vec::new(), vec!["  ".to_string()]);
        assert_eq!(backend.models(), vec!["mock".to_string()]);
    }
}
