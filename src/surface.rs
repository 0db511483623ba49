//! Narrow contract to the editing surface that owns the user's files.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

pub use backend_channel::FileSnapshot;
use thiserror::Error;

/// Full-content replacement of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdit {
    pub path: String,
    pub content: String,
}

impl FileEdit {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("path rejected {path}: {message}")]
    Rejected { path: String, message: String },

    /// The batch failed and every file was left untouched.
    #[error("batch edit failed, no file was changed: {message}")]
    BatchRejected { message: String },

    /// The batch failed after some files were written and could not be undone.
    #[error("batch edit failed after partially applying {applied:?}: {message}")]
    PartialBatch {
        applied: Vec<String>,
        message: String,
    },
}

/// Operations the core needs from the editor or workspace.
///
/// Implementations must read fresh content on every call: the core relies on
/// seeing edits the user made while a request was in flight.
pub trait EditingSurface: Send + Sync {
    fn read_file(&self, path: &str) -> Result<String, SurfaceError>;

    /// Returns the focused file with its current content, or `None` when no
    /// file is focused.
    fn active_file(&self) -> Result<Option<FileSnapshot>, SurfaceError>;

    fn replace_file_content(&self, path: &str, content: &str) -> Result<(), SurfaceError>;

    /// Replaces every file in `edits` as one transaction.
    ///
    /// On `Err`, either nothing changed (`BatchRejected`) or the surface
    /// reports exactly which files were left modified (`PartialBatch`).
    fn apply_batch(&self, edits: &[FileEdit]) -> Result<(), SurfaceError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, String>,
    active: Option<String>,
    unreadable: BTreeSet<String>,
    unwritable: BTreeSet<String>,
}

/// In-memory editing surface for embedding and tests.
///
/// Batches are staged against a copy of the file map and swapped in only when
/// every edit succeeded, so a failing batch never leaves a partial state.
#[derive(Debug, Default)]
pub struct MemorySurface {
    state: Mutex<MemoryState>,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert_file(path, content);
        self
    }

    pub fn insert_file(&self, path: impl Into<String>, content: impl Into<String>) {
        lock_unpoisoned(&self.state)
            .files
            .insert(path.into(), content.into());
    }

    pub fn remove_file(&self, path: &str) {
        lock_unpoisoned(&self.state).files.remove(path);
    }

    /// Focuses `path`; `None` clears the focus.
    pub fn set_active(&self, path: Option<&str>) {
        lock_unpoisoned(&self.state).active = path.map(str::to_string);
    }

    /// Makes every read of `path` fail until cleared.
    pub fn fail_reads_for(&self, path: impl Into<String>) {
        lock_unpoisoned(&self.state).unreadable.insert(path.into());
    }

    /// Makes every write of `path` fail until cleared.
    pub fn fail_writes_for(&self, path: impl Into<String>) {
        lock_unpoisoned(&self.state).unwritable.insert(path.into());
    }

    pub fn clear_failures(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.unreadable.clear();
        state.unwritable.clear();
    }

    #[must_use]
    pub fn content(&self, path: &str) -> Option<String> {
        lock_unpoisoned(&self.state).files.get(path).cloned()
    }
}

impl EditingSurface for MemorySurface {
    fn read_file(&self, path: &str) -> Result<String, SurfaceError> {
        let state = lock_unpoisoned(&self.state);
        if state.unreadable.contains(path) {
            return Err(SurfaceError::Read {
                path: path.to_string(),
                message: "permission denied".to_string(),
            });
        }

        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| SurfaceError::NotFound {
                path: path.to_string(),
            })
    }

    fn active_file(&self) -> Result<Option<FileSnapshot>, SurfaceError> {
        let active = lock_unpoisoned(&self.state).active.clone();
        match active {
            Some(path) => {
                let content = self.read_file(&path)?;
                Ok(Some(FileSnapshot::new(path, content)))
            }
            None => Ok(None),
        }
    }

    fn replace_file_content(&self, path: &str, content: &str) -> Result<(), SurfaceError> {
        let mut state = lock_unpoisoned(&self.state);
        if state.unwritable.contains(path) {
            return Err(SurfaceError::Write {
                path: path.to_string(),
                message: "read-only file".to_string(),
            });
        }

        state.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn apply_batch(&self, edits: &[FileEdit]) -> Result<(), SurfaceError> {
        let mut state = lock_unpoisoned(&self.state);
        let mut staged = state.files.clone();

        for edit in edits {
            if state.unwritable.contains(&edit.path) {
                return Err(SurfaceError::BatchRejected {
                    message: format!("{} is read-only", edit.path),
                });
            }
            staged.insert(edit.path.clone(), edit.content.clone());
        }

        state.files = staged;
        Ok(())
    }
}

/// Locks `mutex`, recovering the guard when a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
