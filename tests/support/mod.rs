#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard};

use patchwise::{
    BackendRequest, EditingSurface, FileEdit, FileSnapshot, Generation, MemorySurface,
    RequestDispatcher, SurfaceError,
};

/// Records every dispatched request and accepts it.
#[derive(Default)]
pub struct DispatcherSpy {
    pub requests: Vec<(Generation, BackendRequest)>,
}

impl DispatcherSpy {
    pub fn dispatch_count(&self) -> usize {
        self.requests.len()
    }

    pub fn last_request(&self) -> &BackendRequest {
        match self.requests.last() {
            Some((_, request)) => request,
            None => panic!("no request was dispatched"),
        }
    }
}

impl RequestDispatcher for DispatcherSpy {
    fn dispatch(&mut self, generation: Generation, request: BackendRequest) -> Result<(), String> {
        self.requests.push((generation, request));
        Ok(())
    }
}

pub fn surface_with_active(path: &str, content: &str) -> MemorySurface {
    let surface = MemorySurface::new().with_file(path, content);
    surface.set_active(Some(path));
    surface
}

/// Surface that writes batch entries one by one and fails on a chosen path,
/// restoring what it already wrote. Mirrors how a real workspace behaves.
pub struct SequentialSurface {
    inner: MemorySurface,
    fail_on: Mutex<Option<String>>,
    pub batch_calls: Mutex<usize>,
    pub single_calls: Mutex<usize>,
}

impl SequentialSurface {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let inner = MemorySurface::new();
        for (path, content) in files {
            inner.insert_file(*path, *content);
        }

        Self {
            inner,
            fail_on: Mutex::new(None),
            batch_calls: Mutex::new(0),
            single_calls: Mutex::new(0),
        }
    }

    pub fn fail_on(&self, path: Option<&str>) {
        *lock_unpoisoned(&self.fail_on) = path.map(str::to_string);
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.inner.content(path)
    }
}

impl EditingSurface for SequentialSurface {
    fn read_file(&self, path: &str) -> Result<String, SurfaceError> {
        self.inner.read_file(path)
    }

    fn active_file(&self) -> Result<Option<FileSnapshot>, SurfaceError> {
        self.inner.active_file()
    }

    fn replace_file_content(&self, path: &str, content: &str) -> Result<(), SurfaceError> {
        *lock_unpoisoned(&self.single_calls) += 1;
        self.inner.replace_file_content(path, content)
    }

    fn apply_batch(&self, edits: &[FileEdit]) -> Result<(), SurfaceError> {
        *lock_unpoisoned(&self.batch_calls) += 1;
        let fail_on = lock_unpoisoned(&self.fail_on).clone();
        let mut backups: Vec<(String, Option<String>)> = Vec::new();

        for edit in edits {
            if fail_on.as_deref() == Some(edit.path.as_str()) {
                for (path, original) in backups.into_iter().rev() {
                    match original {
                        Some(content) => self.inner.insert_file(path, content),
                        None => self.inner.remove_file(&path),
                    }
                }
                return Err(SurfaceError::BatchRejected {
                    message: format!("cannot write {}", edit.path),
                });
            }

            backups.push((edit.path.clone(), self.inner.content(&edit.path)));
            self.inner.insert_file(edit.path.clone(), edit.content.clone());
        }

        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
