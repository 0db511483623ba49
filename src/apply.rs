//! Commits a change set to the editing surface as one transaction.

use thiserror::Error;

use crate::events::CoreEvent;
use crate::surface::{EditingSurface, FileEdit, SurfaceError};
use crate::turn::ChangeSet;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("turn {turn} does not carry a change set")]
    NoChangeSet { turn: usize },

    #[error("no turn proposes changes yet")]
    NothingToApply,

    #[error("apply failed, no file was changed: {source}")]
    Surface {
        #[source]
        source: SurfaceError,
    },

    /// The surface broke its all-or-nothing contract.
    #[error("apply left the workspace partially modified ({}): {message}", .applied.join(", "))]
    PartialApply {
        applied: Vec<String>,
        message: String,
    },
}

impl ApplyError {
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::PartialApply { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub paths: Vec<String>,
    /// Paths whose content changed since the proposal was built.
    pub drifted: Vec<String>,
}

/// Writes every proposed content of `change_set` or none of them.
///
/// The change set is borrowed, so a failed apply can be retried as is.
pub fn apply_change_set(
    change_set: &ChangeSet,
    surface: &dyn EditingSurface,
    emit: &mut dyn FnMut(CoreEvent),
) -> Result<ApplyReport, ApplyError> {
    let drifted = detect_drift(change_set, surface, emit);

    let result = match change_set.changes() {
        [single] => surface.replace_file_content(single.path(), single.proposed_content()),
        changes => {
            let edits: Vec<FileEdit> = changes
                .iter()
                .map(|change| FileEdit::new(change.path(), change.proposed_content()))
                .collect();
            surface.apply_batch(&edits)
        }
    };

    match result {
        Ok(()) => {
            let paths: Vec<String> = change_set.paths().map(str::to_string).collect();
            emit(CoreEvent::info(format!(
                "Applied changes to {} file(s): {}",
                paths.len(),
                paths.join(", ")
            )));
            Ok(ApplyReport { paths, drifted })
        }
        Err(error) => {
            let error = match error {
                SurfaceError::PartialBatch { applied, message } => {
                    ApplyError::PartialApply { applied, message }
                }
                source => ApplyError::Surface { source },
            };
            emit(CoreEvent::error(error.to_string()));
            Err(error)
        }
    }
}

fn detect_drift(
    change_set: &ChangeSet,
    surface: &dyn EditingSurface,
    emit: &mut dyn FnMut(CoreEvent),
) -> Vec<String> {
    let mut drifted = Vec::new();

    for change in change_set.changes() {
        let current = match surface.read_file(change.path()) {
            Ok(current) => current,
            Err(SurfaceError::NotFound { .. }) => String::new(),
            Err(_) => continue,
        };

        if current != change.original_content() {
            emit(CoreEvent::warning(format!(
                "{} changed since the proposal was made; its edits will be overwritten",
                change.path()
            )));
            drifted.push(change.path().to_string());
        }
    }

    drifted
}
