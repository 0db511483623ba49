//! User-curated context files sent along with every request.

use crate::events::CoreEvent;
use crate::surface::{EditingSurface, FileSnapshot, SurfaceError};

/// Canonical spelling of a workspace path used for every comparison.
///
/// Trims whitespace and drops `.` segments and repeated separators, so
/// `./src//utils.py` and `src/utils.py` name the same file. `..` is kept.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let absolute = path.starts_with('/');
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Reference to a file by path. Content is read on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    path: String,
}

impl FileRef {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read(&self, surface: &dyn EditingSurface) -> Result<String, SurfaceError> {
        surface.read_file(&self.path)
    }
}

/// Contents gathered for one request: the active file plus every readable
/// context file, in the order the user added them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub active: FileSnapshot,
    pub files: Vec<FileSnapshot>,
}

impl ContextSnapshot {
    /// Returns the captured content for `path`, checking the active file first.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&str> {
        let path = normalize_path(path);
        if normalize_path(&self.active.path) == path {
            return Some(&self.active.content);
        }

        self.files
            .iter()
            .find(|file| normalize_path(&file.path) == path)
            .map(|file| file.content.as_str())
    }

    /// Replaces the active file entry, keeping context files as captured.
    #[must_use]
    pub fn with_active(mut self, active: FileSnapshot) -> Self {
        self.active = active;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStore {
    files: Vec<FileRef>,
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `file`. Returns false when the path is blank or already tracked.
    pub fn add_file(&mut self, file: FileRef) -> bool {
        if file.path.trim().is_empty() || self.contains(&file.path) {
            return false;
        }

        self.files.push(file);
        true
    }

    /// Stops tracking `path`. Returns false when it was not tracked.
    pub fn remove_file(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        let before = self.files.len();
        self.files.retain(|file| file.path != path);
        self.files.len() != before
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.files.iter().any(|file| file.path == path)
    }

    #[must_use]
    pub fn list(&self) -> &[FileRef] {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Reads every tracked file alongside `active`.
    ///
    /// An unreadable file is reported through `emit` and left out; it never
    /// fails the snapshot. A tracked file that is also the active file is
    /// captured once, as the active entry.
    pub fn snapshot(
        &self,
        active: FileSnapshot,
        surface: &dyn EditingSurface,
        emit: &mut dyn FnMut(CoreEvent),
    ) -> ContextSnapshot {
        let mut files = Vec::with_capacity(self.files.len());

        for file in &self.files {
            if file.path == normalize_path(&active.path) {
                continue;
            }

            match file.read(surface) {
                Ok(content) => files.push(FileSnapshot::new(file.path.clone(), content)),
                Err(error) => emit(CoreEvent::warning(format!(
                    "Skipping context file {}: {error}",
                    file.path
                ))),
            }
        }

        ContextSnapshot { active, files }
    }
}
