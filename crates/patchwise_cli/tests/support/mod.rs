use std::fs;
use std::path::Path;
use std::sync::Arc;

use backend_channel_mock::ScriptedBackend;
use patchwise::{Session, SessionOptions, SessionRuntime};
use patchwise_cli::app::{App, Flow};
use workspace_fs::FsSurface;

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub backend: Arc<ScriptedBackend>,
    pub app: App,
}

impl Harness {
    pub fn new(files: &[(&str, &str)], backend: ScriptedBackend) -> Self {
        Self::with_options(files, backend, SessionOptions::default().with_model("mock"))
    }

    pub fn with_options(
        files: &[(&str, &str)],
        backend: ScriptedBackend,
        options: SessionOptions,
    ) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        for (path, content) in files {
            fs::write(dir.path().join(path), content).expect("write fixture");
        }
        let surface = Arc::new(FsSurface::new(dir.path()).expect("surface"));
        let backend = Arc::new(backend);
        let runtime = SessionRuntime::new(Session::new(options), backend.clone(), surface.clone());

        Self {
            dir,
            backend,
            app: App::new(runtime, surface),
        }
    }

    /// Feeds one input line and returns what the app printed.
    pub fn run(&mut self, line: &str) -> String {
        self.run_with_flow(line).0
    }

    pub fn run_with_flow(&mut self, line: &str) -> (String, Flow) {
        let mut out = Vec::new();
        let flow = self.app.handle_line(line, &mut out).expect("write output");
        (String::from_utf8(out).expect("utf-8 output"), flow)
    }

    /// Waits for in-flight backend calls and delivers their outcomes.
    pub fn settle(&mut self) -> String {
        self.app.runtime().wait_for_workers();
        let mut out = Vec::new();
        self.app.handle_wake(&mut out).expect("write output");
        String::from_utf8(out).expect("utf-8 output")
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.dir.path().join(path)).expect("read workspace file")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
