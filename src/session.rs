//! Session engine: the turn log, the single in-flight request and the
//! orchestration between context, backend, classifier and change sets.
//!
//! The session never talks to a transport directly. `submit` hands a request
//! to a [`RequestDispatcher`] and returns; the caller later feeds the outcome
//! back through [`Session::on_backend_reply`] or
//! [`Session::on_backend_failure`], tagged with the generation it was
//! dispatched under. Outcomes for any other generation are dropped.

use backend_channel::{BackendRequest, Generation, RawReply};
use thiserror::Error;

use crate::apply::{apply_change_set, ApplyError, ApplyReport};
use crate::changeset::build_turn;
use crate::classify::classify;
use crate::context::{ContextSnapshot, ContextStore, FileRef};
use crate::events::CoreEvent;
use crate::surface::{EditingSurface, FileSnapshot};
use crate::turn::{ChangeSet, Turn};

pub const DEFAULT_LOADING_HINT: &str = "Thinking...";
pub const DEFAULT_MODEL: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub loading_hint: String,
    /// Accepted active-file extensions without the dot. Empty accepts any file.
    pub accepted_extensions: Vec<String>,
    pub model: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            loading_hint: DEFAULT_LOADING_HINT.to_string(),
            accepted_extensions: Vec::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_accepted_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_extensions = extensions
            .into_iter()
            .map(Into::into)
            .map(|extension| extension.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|extension| !extension.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_loading_hint(mut self, hint: impl Into<String>) -> Self {
        self.loading_hint = hint.into();
        self
    }

    fn accepts(&self, path: &str) -> bool {
        if self.accepted_extensions.is_empty() {
            return true;
        }

        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => {
                let extension = extension.to_ascii_lowercase();
                self.accepted_extensions
                    .iter()
                    .any(|accepted| *accepted == extension)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("model id must not be empty")]
    BlankModel,

    #[error("context file path must not be empty")]
    BlankPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse { generation: Generation },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Dispatched { generation: Generation },
    /// Nothing happened: blank text or a request already in flight.
    Ignored,
    /// An error turn was appended instead of dispatching.
    Rejected,
}

/// Hands a request to whatever transport the host uses.
///
/// `dispatch` must not block on the backend; it returns once the request is
/// on its way. An `Err` means the request never left and becomes an error
/// turn immediately.
pub trait RequestDispatcher {
    fn dispatch(&mut self, generation: Generation, request: BackendRequest) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    generation: Generation,
    active: FileSnapshot,
    snapshot: ContextSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    turns: Vec<Turn>,
    in_flight: Option<InFlight>,
    last_generation: Generation,
    context: ContextStore,
    model: String,
    options: SessionOptions,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Session {
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        let model = if options.model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            options.model.trim().to_string()
        };

        Self {
            turns: Vec::new(),
            in_flight: None,
            last_generation: 0,
            context: ContextStore::new(),
            model,
            options,
        }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.in_flight {
            Some(in_flight) => SessionState::AwaitingResponse {
                generation: in_flight.generation,
            },
            None => SessionState::Idle,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), SessionError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(SessionError::BlankModel);
        }

        self.model = model.to_string();
        Ok(())
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    #[must_use]
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Tracks a context file. `Ok(false)` means it was already tracked.
    pub fn add_context_file(&mut self, path: &str) -> Result<bool, SessionError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(SessionError::BlankPath);
        }

        Ok(self.context.add_file(FileRef::new(path)))
    }

    pub fn remove_context_file(&mut self, path: &str) -> bool {
        self.context.remove_file(path.trim())
    }

    pub fn submit(
        &mut self,
        text: &str,
        surface: &dyn EditingSurface,
        dispatcher: &mut dyn RequestDispatcher,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> SubmitOutcome {
        let prompt = text.trim();
        if prompt.is_empty() {
            return SubmitOutcome::Ignored;
        }

        if let Some(in_flight) = &self.in_flight {
            emit(CoreEvent::info(format!(
                "Ignoring new message while request {} is in flight",
                in_flight.generation
            )));
            return SubmitOutcome::Ignored;
        }

        let active = match self.active_file_for_request(surface) {
            Ok(active) => active,
            Err(message) => {
                self.turns.push(Turn::UserInput {
                    text: prompt.to_string(),
                });
                self.push_error(message, emit);
                return SubmitOutcome::Rejected;
            }
        };

        self.turns.push(Turn::UserInput {
            text: prompt.to_string(),
        });
        self.turns.push(Turn::Loading {
            hint: self.options.loading_hint.clone(),
        });

        self.last_generation += 1;
        let generation = self.last_generation;
        let snapshot = self.context.snapshot(active.clone(), surface, emit);
        let request = BackendRequest {
            prompt_text: prompt.to_string(),
            active_file: active.clone(),
            context_files: snapshot.files.clone(),
            model: self.model.clone(),
        };
        self.in_flight = Some(InFlight {
            generation,
            active,
            snapshot,
        });

        match dispatcher.dispatch(generation, request) {
            Ok(()) => {
                emit(CoreEvent::info(format!(
                    "Dispatched request {generation} with model {}",
                    self.model
                )));
                SubmitOutcome::Dispatched { generation }
            }
            Err(message) => {
                self.in_flight = None;
                self.remove_loading();
                self.push_error(format!("Failed to send request: {message}"), emit);
                SubmitOutcome::Rejected
            }
        }
    }

    /// Applies a backend reply. Returns false when the reply was stale.
    ///
    /// The active file is re-read here so single-file diffs reflect edits made
    /// while the request was in flight.
    pub fn on_backend_reply(
        &mut self,
        generation: Generation,
        raw: &RawReply,
        surface: &dyn EditingSurface,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> bool {
        let Some(in_flight) = self.take_in_flight(generation, emit) else {
            return false;
        };
        self.remove_loading();

        let live = match surface.read_file(&in_flight.active.path) {
            Ok(content) => FileSnapshot::new(in_flight.active.path.clone(), content),
            Err(error) => {
                emit(CoreEvent::warning(format!(
                    "Could not re-read {}, diffing against the content sent with the request: {error}",
                    in_flight.active.path
                )));
                in_flight.active.clone()
            }
        };

        let snapshot = in_flight.snapshot.with_active(live.clone());
        let turn = build_turn(&live, &snapshot, classify(raw), emit);
        self.turns.push(turn);
        true
    }

    /// Records a transport failure. Returns false when the failure was stale.
    pub fn on_backend_failure(
        &mut self,
        generation: Generation,
        message: &str,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> bool {
        if self.take_in_flight(generation, emit).is_none() {
            return false;
        }

        self.remove_loading();
        self.push_error(message.to_string(), emit);
        true
    }

    /// Empties the log. A reply still in flight is discarded when it arrives.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.in_flight = None;
    }

    #[must_use]
    pub fn change_set(&self, turn: usize) -> Option<&ChangeSet> {
        self.turns.get(turn).and_then(Turn::change_set)
    }

    /// Index of the most recent turn carrying a change set.
    #[must_use]
    pub fn latest_change_set_turn(&self) -> Option<usize> {
        self.turns.iter().rposition(|turn| turn.change_set().is_some())
    }

    pub fn apply_turn(
        &self,
        turn: usize,
        surface: &dyn EditingSurface,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> Result<ApplyReport, ApplyError> {
        let change_set = self
            .change_set(turn)
            .ok_or(ApplyError::NoChangeSet { turn })?;
        apply_change_set(change_set, surface, emit)
    }

    pub fn apply_latest(
        &self,
        surface: &dyn EditingSurface,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> Result<ApplyReport, ApplyError> {
        let turn = self
            .latest_change_set_turn()
            .ok_or(ApplyError::NothingToApply)?;
        self.apply_turn(turn, surface, emit)
    }

    fn active_file_for_request(&self, surface: &dyn EditingSurface) -> Result<FileSnapshot, String> {
        let active = surface
            .active_file()
            .map_err(|error| format!("Could not read the active file: {error}"))?
            .ok_or_else(|| "No active file. Open a file before asking for changes.".to_string())?;

        if !self.options.accepts(&active.path) {
            return Err(format!(
                "{} is not a supported file type (accepted: {})",
                active.path,
                self.options.accepted_extensions.join(", ")
            ));
        }

        Ok(active)
    }

    fn take_in_flight(
        &mut self,
        generation: Generation,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> Option<InFlight> {
        let current = self.in_flight.as_ref().map(|in_flight| in_flight.generation);
        if current != Some(generation) {
            emit(CoreEvent::info(format!(
                "Discarding stale outcome for request {generation}"
            )));
            return None;
        }

        self.in_flight.take()
    }

    fn remove_loading(&mut self) {
        if self.turns.last().is_some_and(Turn::is_loading) {
            self.turns.pop();
        }
    }

    fn push_error(&mut self, message: String, emit: &mut dyn FnMut(CoreEvent)) {
        emit(CoreEvent::error(message.clone()));
        self.turns.push(Turn::Error { message });
    }
}
