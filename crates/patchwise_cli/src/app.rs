//! Line-oriented front end over a [`SessionRuntime`].

use std::io::{self, Write};
use std::sync::Arc;

use patchwise::{CoreEvent, EventLevel, EventLog, SessionRuntime, SubmitOutcome};
use workspace_fs::FsSurface;

use crate::commands::{parse_slash_command, SlashCommand, HELP_LINES};

/// Target used for events forwarded from the core.
pub const CORE_EVENT_TARGET: &str = "patchwise::core";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    runtime: Arc<SessionRuntime>,
    surface: Arc<FsSurface>,
}

impl App {
    pub fn new(runtime: Arc<SessionRuntime>, surface: Arc<FsSurface>) -> Self {
        Self { runtime, surface }
    }

    pub fn runtime(&self) -> &Arc<SessionRuntime> {
        &self.runtime
    }

    pub fn write_banner(&self, out: &mut dyn Write) -> io::Result<()> {
        let profile = self.runtime.backend().profile();
        writeln!(
            out,
            "patchwise | backend: {} | workspace: {}",
            profile.backend_id,
            self.surface.root().display()
        )?;
        writeln!(out, "/open a file to start, /help for commands")
    }

    pub fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let Some(command) = parse_slash_command(line) else {
            return self.submit(line, out).map(|()| Flow::Continue);
        };

        match command {
            SlashCommand::Help => {
                for help in HELP_LINES {
                    writeln!(out, "  {help}")?;
                }
            }
            SlashCommand::Clear => {
                self.runtime.clear();
                self.render(out)?;
            }
            SlashCommand::Open(path) => match self.surface.open(&path) {
                Ok(path) => writeln!(out, "active file: {path}")?,
                Err(error) => writeln!(out, "cannot open {path}: {error}")?,
            },
            SlashCommand::Add(path) => {
                match self
                    .runtime
                    .with_session(|session| session.add_context_file(&path))
                {
                    Ok(true) => writeln!(out, "added {} to context", path.trim())?,
                    Ok(false) => writeln!(out, "{} is already in context", path.trim())?,
                    Err(error) => writeln!(out, "{error}")?,
                }
            }
            SlashCommand::Remove(path) => {
                if self
                    .runtime
                    .with_session(|session| session.remove_context_file(&path))
                {
                    writeln!(out, "removed {} from context", path.trim())?;
                } else {
                    writeln!(out, "{} is not in context", path.trim())?;
                }
            }
            SlashCommand::Context => self.write_context(out)?,
            SlashCommand::Model(None) => {
                let model = self
                    .runtime
                    .with_session(|session| session.model().to_string());
                let models = self.runtime.backend().models();
                writeln!(out, "model: {model} (available: {})", models.join(", "))?;
            }
            SlashCommand::Model(Some(model)) => match self.runtime.set_model(&model) {
                Ok(()) => {
                    if !self.runtime.backend().models().iter().any(|id| *id == model) {
                        tracing::warn!(%model, "model is not advertised by the backend");
                    }
                    writeln!(out, "model: {model}")?;
                }
                Err(error) => writeln!(out, "{error}")?,
            },
            SlashCommand::Apply(turn) => self.apply(turn, out)?,
            SlashCommand::Quit => return Ok(Flow::Quit),
            SlashCommand::Usage(usage) => writeln!(out, "usage: {usage}")?,
            SlashCommand::Unknown(command) => {
                writeln!(out, "unknown command {command}, try /help")?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Applies finished backend outcomes and re-renders when any arrived.
    pub fn handle_wake(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let mut log = EventLog::new();
        let drained = self.runtime.drain_pending_events(&mut log.sink());
        report_events(log, out)?;
        if drained > 0 {
            self.render(out)?;
        }
        Ok(())
    }

    fn submit(&mut self, text: &str, out: &mut dyn Write) -> io::Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let mut log = EventLog::new();
        let outcome = self.runtime.submit(text, &mut log.sink());
        report_events(log, out)?;
        match outcome {
            SubmitOutcome::Ignored => writeln!(out, "still waiting for the previous reply"),
            SubmitOutcome::Dispatched { .. } | SubmitOutcome::Rejected => self.render(out),
        }
    }

    fn apply(&mut self, turn: Option<usize>, out: &mut dyn Write) -> io::Result<()> {
        let mut log = EventLog::new();
        let result = match turn {
            Some(turn) => self.runtime.apply_turn(turn, &mut log.sink()),
            None => self.runtime.apply_latest(&mut log.sink()),
        };
        report_events(log, out)?;

        match result {
            Ok(report) => writeln!(
                out,
                "applied {} file(s): {}",
                report.paths.len(),
                report.paths.join(", ")
            ),
            Err(error) => writeln!(out, "apply failed: {error}"),
        }
    }

    fn write_context(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.surface.active_path() {
            Some(path) => writeln!(out, "active: {path}")?,
            None => writeln!(out, "active: (none)")?,
        }

        let files: Vec<String> = self.runtime.with_session(|session| {
            session
                .context()
                .list()
                .iter()
                .map(|file| file.path().to_string())
                .collect()
        });
        if files.is_empty() {
            writeln!(out, "context: (none)")?;
        }
        for file in files {
            writeln!(out, "context: {file}")?;
        }
        Ok(())
    }

    fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        for line in self.runtime.render() {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }
}

/// Forwards a core event to `tracing`.
pub fn trace_event(event: &CoreEvent) {
    match event.level() {
        EventLevel::Info => tracing::info!(target: CORE_EVENT_TARGET, "{}", event.message()),
        EventLevel::Warning => tracing::warn!(target: CORE_EVENT_TARGET, "{}", event.message()),
        EventLevel::Error => tracing::error!(target: CORE_EVENT_TARGET, "{}", event.message()),
    }
}

/// Traces every event and echoes warnings to the user.
fn report_events(mut log: EventLog, out: &mut dyn Write) -> io::Result<()> {
    for event in log.drain() {
        trace_event(&event);
        if event.level() == EventLevel::Warning {
            writeln!(out, "! {}", event.message())?;
        }
    }
    Ok(())
}
