//! Child-process transport for the backend channel.
//!
//! Every request spawns the configured command, writes the request JSON to
//! its stdin, closes it, and expects exactly one JSON reply on stdout.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use backend_channel::{BackendChannel, BackendError, BackendProfile, BackendRequest, RawReply};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Stable backend identifier used by startup selection.
pub const PROCESS_BACKEND_ID: &str = "process";
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_PROCESS_MODEL: &str = "default";
const STDERR_MAX_BYTES: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBackendConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
    pub model: String,
}

impl ProcessBackendConfig {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_PROCESS_TIMEOUT,
            working_dir: None,
            model: DEFAULT_PROCESS_MODEL.to_string(),
        }
    }

    /// Splits a whitespace-separated command line into program and arguments.
    pub fn from_command_line(command_line: &str) -> Result<Self, ProcessBackendError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ProcessBackendError::EmptyCommand)?;
        Ok(Self::new(program, parts.collect()))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum ProcessBackendError {
    #[error("backend command is empty")]
    EmptyCommand,

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while {stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("no reply within {}s", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("command exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("stdout is not valid UTF-8")]
    InvalidUtf8,

    #[error("stdout is not a JSON reply: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl ProcessBackendError {
    pub fn into_backend_error(self) -> BackendError {
        let message = self.to_string();
        match self {
            Self::Timeout { .. } => BackendError::timeout(message),
            Self::InvalidUtf8 | Self::InvalidJson { .. } => BackendError::protocol(message),
            Self::EmptyCommand | Self::Spawn { .. } | Self::Io { .. } | Self::Exit { .. } => {
                BackendError::process(message)
            }
        }
    }
}

/// `BackendChannel` that runs one child process per request.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    config: ProcessBackendConfig,
}

impl ProcessBackend {
    pub fn new(config: ProcessBackendConfig) -> Result<Self, ProcessBackendError> {
        if config.program.trim().is_empty() {
            return Err(ProcessBackendError::EmptyCommand);
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ProcessBackendConfig {
        &self.config
    }

    pub fn run(&self, request: &BackendRequest) -> Result<RawReply, ProcessBackendError> {
        let input = serde_json::to_vec(request)
            .map_err(|source| ProcessBackendError::InvalidJson { source })?;
        let mut child = self.spawn()?;
        tracing::debug!(
            program = %self.config.program,
            pid = child.id(),
            "spawned backend process"
        );

        let stdin = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                if let Err(error) = stdin.write_all(&input) {
                    tracing::debug!(%error, "backend process closed stdin early");
                }
            })
        });
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = wait_with_timeout(&mut child, self.config.timeout)?;
        if let Some(stdin) = stdin {
            let _ = stdin.join();
        }
        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);

        let Some(status) = status else {
            tracing::warn!(
                program = %self.config.program,
                timeout_ms = self.config.timeout.as_millis() as u64,
                "backend process timed out"
            );
            return Err(ProcessBackendError::Timeout {
                timeout: self.config.timeout,
            });
        };

        tracing::debug!(program = %self.config.program, %status, "backend process exited");
        if !status.success() {
            return Err(ProcessBackendError::Exit {
                status: format_exit_status(status),
                stderr: truncate_to_byte_limit(
                    String::from_utf8_lossy(&stderr).trim().to_string(),
                    STDERR_MAX_BYTES,
                ),
            });
        }

        let stdout = String::from_utf8(stdout).map_err(|_| ProcessBackendError::InvalidUtf8)?;
        serde_json::from_str(stdout.trim())
            .map_err(|source| ProcessBackendError::InvalidJson { source })
    }

    fn spawn(&self) -> Result<Child, ProcessBackendError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(working_dir) = &self.config.working_dir {
            command.current_dir(working_dir);
        }

        command
            .spawn()
            .map_err(|source| ProcessBackendError::Spawn {
                program: self.config.program.clone(),
                source,
            })
    }
}

impl BackendChannel for ProcessBackend {
    fn profile(&self) -> BackendProfile {
        BackendProfile {
            backend_id: PROCESS_BACKEND_ID.to_string(),
            default_model: self.config.model.clone(),
        }
    }

    fn send(&self, request: BackendRequest) -> Result<RawReply, BackendError> {
        self.run(&request)
            .map_err(ProcessBackendError::into_backend_error)
    }
}

/// Returns `None` when the deadline passed; the child is killed and reaped.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<ExitStatus>, ProcessBackendError> {
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok(Some(status)),
        Ok(None) => {
            let _ = child.kill();
            child
                .wait()
                .map_err(|source| ProcessBackendError::Io {
                    stage: "reaping a timed out process",
                    source,
                })?;
            Ok(None)
        }
        Err(source) => {
            reap_after_kill(child);
            Err(ProcessBackendError::Io {
                stage: "waiting for the process",
                source,
            })
        }
    }
}

fn reap_after_kill(child: &mut Child) {
    if let Err(error) = child.kill() {
        tracing::debug!(%error, "failed to kill backend process");
    }
    match child.wait() {
        Ok(status) => tracing::debug!(%status, "reaped backend process"),
        Err(error) => tracing::debug!(%error, "failed to reap backend process"),
    }
}

fn spawn_reader(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str(" [truncated]");
    truncated
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}
