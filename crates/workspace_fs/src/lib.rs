//! Filesystem-backed editing surface rooted at one workspace directory.
//!
//! Paths handed to the surface are workspace-relative (absolute paths are
//! accepted when they resolve inside the root). Every read goes to disk.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use patchwise::{EditingSurface, FileEdit, FileSnapshot, SurfaceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsSurfaceError {
    #[error("failed to resolve workspace root {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("workspace root must be a directory: {}", .path.display())]
    RootNotDirectory { path: PathBuf },

    #[error("path must not be empty")]
    EmptyPath,

    #[error("path escapes workspace root: {path}")]
    EscapesRoot { path: String },

    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("not a regular file: {path}")]
    NotAFile { path: String },

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsSurfaceError {
    fn io(action: &'static str, path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound && action == "read" {
            return Self::NotFound {
                path: path.to_string(),
            };
        }
        Self::Io {
            action,
            path: path.to_string(),
            source,
        }
    }

    /// Maps the error onto the editing-surface contract for `path`.
    #[must_use]
    pub fn into_surface_error(self, path: &str) -> SurfaceError {
        let message = self.to_string();
        match self {
            Self::NotFound { path } => SurfaceError::NotFound { path },
            Self::EmptyPath | Self::EscapesRoot { .. } | Self::NotAFile { .. } => {
                SurfaceError::Rejected {
                    path: path.to_string(),
                    message,
                }
            }
            Self::Io { action: "read", .. } => SurfaceError::Read {
                path: path.to_string(),
                message,
            },
            Self::Root { .. } | Self::RootNotDirectory { .. } | Self::Io { .. } => {
                SurfaceError::Write {
                    path: path.to_string(),
                    message,
                }
            }
        }
    }
}

/// A file's state before a batch touched it.
#[derive(Debug)]
enum Backup {
    Existing(String),
    Absent { created_dirs: Vec<PathBuf> },
}

#[derive(Debug)]
struct BatchTarget<'a> {
    edit: &'a FileEdit,
    absolute: PathBuf,
    backup: Backup,
}

/// `EditingSurface` over the real filesystem.
#[derive(Debug)]
pub struct FsSurface {
    root: PathBuf,
    active: Mutex<Option<String>>,
}

impl FsSurface {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FsSurfaceError> {
        let root = root.into();
        let canonical = root
            .canonicalize()
            .map_err(|source| FsSurfaceError::Root {
                path: root.clone(),
                source,
            })?;
        if !canonical.is_dir() {
            return Err(FsSurfaceError::RootNotDirectory { path: canonical });
        }

        Ok(Self {
            root: canonical,
            active: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Focuses an existing file and returns its workspace-relative path.
    pub fn open(&self, path: &str) -> Result<String, FsSurfaceError> {
        let resolved = self.resolve_existing_path(path)?;
        if !resolved.is_file() {
            return Err(FsSurfaceError::NotAFile {
                path: path.to_string(),
            });
        }

        let relative = self.relative_display(&resolved);
        tracing::debug!(path = %relative, "opened file");
        *lock_unpoisoned(&self.active) = Some(relative.clone());
        Ok(relative)
    }

    pub fn close(&self) {
        *lock_unpoisoned(&self.active) = None;
    }

    #[must_use]
    pub fn active_path(&self) -> Option<String> {
        lock_unpoisoned(&self.active).clone()
    }

    fn read(&self, path: &str) -> Result<String, FsSurfaceError> {
        let resolved = self.resolve_existing_path(path)?;
        if !resolved.is_file() {
            return Err(FsSurfaceError::NotAFile {
                path: path.to_string(),
            });
        }
        fs::read_to_string(&resolved).map_err(|source| FsSurfaceError::io("read", path, source))
    }

    fn write(&self, path: &str, content: &str) -> Result<(), FsSurfaceError> {
        let target = self.resolve_write_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| FsSurfaceError::io("create directories for", path, source))?;
        }
        fs::write(&target, content).map_err(|source| FsSurfaceError::io("write", path, source))
    }

    fn resolve_existing_path(&self, path: &str) -> Result<PathBuf, FsSurfaceError> {
        if path.trim().is_empty() {
            return Err(FsSurfaceError::EmptyPath);
        }

        let candidate = self.absolute_candidate(path);
        let canonical = candidate
            .canonicalize()
            .map_err(|source| FsSurfaceError::io("read", path, source))?;
        self.ensure_inside_workspace(&canonical, path)?;
        Ok(canonical)
    }

    fn resolve_write_path(&self, path: &str) -> Result<PathBuf, FsSurfaceError> {
        if path.trim().is_empty() {
            return Err(FsSurfaceError::EmptyPath);
        }

        let candidate = self.absolute_candidate(path);
        if candidate
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(FsSurfaceError::EscapesRoot {
                path: path.to_string(),
            });
        }
        if candidate.is_dir() {
            return Err(FsSurfaceError::NotAFile {
                path: path.to_string(),
            });
        }

        let anchor = canonicalize_existing_ancestor(&candidate)
            .map_err(|source| FsSurfaceError::io("resolve", path, source))?;
        self.ensure_inside_workspace(&anchor, path)?;
        Ok(candidate)
    }

    fn absolute_candidate(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn ensure_inside_workspace(&self, canonical: &Path, path: &str) -> Result<(), FsSurfaceError> {
        if canonical.starts_with(&self.root) {
            Ok(())
        } else {
            Err(FsSurfaceError::EscapesRoot {
                path: path.to_string(),
            })
        }
    }

    fn relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn prepare_batch<'a>(
        &self,
        edits: &'a [FileEdit],
    ) -> Result<Vec<BatchTarget<'a>>, SurfaceError> {
        let mut targets = Vec::with_capacity(edits.len());
        for edit in edits {
            let absolute = self.resolve_write_path(&edit.path).map_err(|error| {
                SurfaceError::BatchRejected {
                    message: error.to_string(),
                }
            })?;
            let backup = if absolute.exists() {
                let content = fs::read_to_string(&absolute).map_err(|error| {
                    SurfaceError::BatchRejected {
                        message: format!("failed to back up {}: {error}", edit.path),
                    }
                })?;
                Backup::Existing(content)
            } else {
                Backup::Absent {
                    created_dirs: missing_ancestors(&absolute),
                }
            };
            targets.push(BatchTarget {
                edit,
                absolute,
                backup,
            });
        }
        Ok(targets)
    }

    /// Restores `targets` in reverse order and returns the paths that could
    /// not be restored.
    fn roll_back(&self, targets: &[BatchTarget<'_>]) -> Vec<String> {
        let mut unrestored = Vec::new();
        for target in targets.iter().rev() {
            let restored = match &target.backup {
                Backup::Existing(content) => fs::write(&target.absolute, content),
                Backup::Absent { created_dirs } => {
                    let removed = if target.absolute.exists() {
                        fs::remove_file(&target.absolute)
                    } else {
                        Ok(())
                    };
                    for dir in created_dirs.iter().rev() {
                        let _ = fs::remove_dir(dir);
                    }
                    removed
                }
            };
            if let Err(error) = restored {
                tracing::error!(path = %target.edit.path, %error, "failed to roll back file");
                unrestored.push(target.edit.path.clone());
            }
        }
        unrestored.reverse();
        unrestored
    }
}

impl EditingSurface for FsSurface {
    fn read_file(&self, path: &str) -> Result<String, SurfaceError> {
        self.read(path)
            .map_err(|error| error.into_surface_error(path))
    }

    fn active_file(&self) -> Result<Option<FileSnapshot>, SurfaceError> {
        let Some(path) = self.active_path() else {
            return Ok(None);
        };
        let content = self.read_file(&path)?;
        Ok(Some(FileSnapshot::new(path, content)))
    }

    fn replace_file_content(&self, path: &str, content: &str) -> Result<(), SurfaceError> {
        self.write(path, content)
            .map_err(|error| error.into_surface_error(path))
    }

    fn apply_batch(&self, edits: &[FileEdit]) -> Result<(), SurfaceError> {
        let targets = self.prepare_batch(edits)?;

        for (index, target) in targets.iter().enumerate() {
            if let Err(error) = self.write(&target.edit.path, &target.edit.content) {
                let message = error.to_string();
                tracing::warn!(path = %target.edit.path, %message, "batch write failed, rolling back");

                let unrestored = self.roll_back(&targets[..=index]);
                if unrestored.is_empty() {
                    return Err(SurfaceError::BatchRejected { message });
                }
                return Err(SurfaceError::PartialBatch {
                    applied: unrestored,
                    message,
                });
            }
        }

        tracing::debug!(files = targets.len(), "batch applied");
        Ok(())
    }
}

fn canonicalize_existing_ancestor(path: &Path) -> io::Result<PathBuf> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor.canonicalize();
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no existing ancestor for {}", path.display()),
    ))
}

/// Directories between `path` and its nearest existing ancestor, outermost
/// first.
fn missing_ancestors(path: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = path
        .ancestors()
        .skip(1)
        .take_while(|ancestor| !ancestor.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
