//! Conversation log entries and the change sets they carry.

use thiserror::Error;

use crate::diff::{diff, Patch};

/// Proposed replacement of one file, with its patch computed on construction.
///
/// Fields are private so `patch` always matches `(original, proposed)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    path: String,
    original_content: String,
    proposed_content: String,
    patch: Patch,
}

impl FileChange {
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        original_content: impl Into<String>,
        proposed_content: impl Into<String>,
    ) -> Self {
        let original_content = original_content.into();
        let proposed_content = proposed_content.into();
        let patch = diff(&original_content, &proposed_content);

        Self {
            path: path.into(),
            original_content,
            proposed_content,
            patch,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    #[must_use]
    pub fn proposed_content(&self) -> &str {
        &self.proposed_content
    }

    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// True when the proposal leaves the file as it was.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.patch.is_empty()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChangeSetError {
    #[error("a change set must touch at least one file")]
    Empty,

    #[error("path {path} appears more than once in the change set")]
    DuplicatePath { path: String },
}

/// Ordered per-file replacements proposed by one assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<FileChange>,
}

impl ChangeSet {
    /// Builds a change set, rejecting empty input and repeated paths.
    pub fn new(changes: Vec<FileChange>) -> Result<Self, ChangeSetError> {
        if changes.is_empty() {
            return Err(ChangeSetError::Empty);
        }

        for (index, change) in changes.iter().enumerate() {
            if changes[..index]
                .iter()
                .any(|earlier| earlier.path == change.path)
            {
                return Err(ChangeSetError::DuplicatePath {
                    path: change.path.clone(),
                });
            }
        }

        Ok(Self { changes })
    }

    #[must_use]
    pub fn single(change: FileChange) -> Self {
        Self {
            changes: vec![change],
        }
    }

    #[must_use]
    pub fn changes(&self) -> &[FileChange] {
        &self.changes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.changes.iter().find(|change| change.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(FileChange::path)
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    UserInput {
        text: String,
    },
    Loading {
        hint: String,
    },
    Explanation {
        text: String,
    },
    ExplanationWithChanges {
        explanation: String,
        change_set: ChangeSet,
    },
    ReplaceFile {
        change_set: ChangeSet,
    },
    MultiFileChange {
        explanation: String,
        change_set: ChangeSet,
    },
    Error {
        message: String,
    },
}

impl Turn {
    #[must_use]
    pub fn change_set(&self) -> Option<&ChangeSet> {
        match self {
            Self::ExplanationWithChanges { change_set, .. }
            | Self::ReplaceFile { change_set }
            | Self::MultiFileChange { change_set, .. } => Some(change_set),
            Self::UserInput { .. }
            | Self::Loading { .. }
            | Self::Explanation { .. }
            | Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Short lowercase label, stable across releases.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::UserInput { .. } => "user_input",
            Self::Loading { .. } => "loading",
            Self::Explanation { .. } => "explanation",
            Self::ExplanationWithChanges { .. } => "explanation_with_changes",
            Self::ReplaceFile { .. } => "replace_file",
            Self::MultiFileChange { .. } => "multi_file_change",
            Self::Error { .. } => "error",
        }
    }
}
