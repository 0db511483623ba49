use std::io::{self, BufRead};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use patchwise::{Session, SessionRuntime};
use patchwise_cli::app::{App, Flow};
use patchwise_cli::backends::backend_from_config;
use patchwise_cli::config::EnvConfig;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use workspace_fs::FsSurface;

/// Everything the main loop reacts to, in arrival order.
enum Input {
    Line(String),
    Eof,
    Wake,
}

fn main() -> anyhow::Result<()> {
    let config = EnvConfig::from_env();
    setup_logging(&config);

    let workspace = config.workspace_root()?;
    let surface = Arc::new(
        FsSurface::new(&workspace)
            .with_context(|| format!("cannot use workspace {}", workspace.display()))?,
    );
    let backend = backend_from_config(&config, surface.root())?;
    let options = config.session_options(&backend.profile().default_model);
    tracing::info!(
        backend = %backend.profile().backend_id,
        model = %options.model,
        workspace = %surface.root().display(),
        "starting session"
    );

    let (sender, receiver) = mpsc::channel();
    let wake_sender = sender.clone();
    let runtime = SessionRuntime::with_wake(
        Session::new(options),
        backend,
        surface.clone(),
        move || {
            let _ = wake_sender.send(Input::Wake);
        },
    );
    spawn_stdin_reader(sender)?;

    let mut app = App::new(runtime, surface);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    app.write_banner(&mut out)?;

    for input in receiver {
        match input {
            Input::Line(line) => {
                if app.handle_line(&line, &mut out)? == Flow::Quit {
                    break;
                }
            }
            Input::Wake => app.handle_wake(&mut out)?,
            Input::Eof => break,
        }
    }

    Ok(())
}

fn spawn_stdin_reader(sender: Sender<Input>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("patchwise-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(Input::Line(line)).is_err() {
                    return;
                }
            }
            let _ = sender.send(Input::Eof);
        })
        .context("failed to start the input thread")?;
    Ok(())
}

fn setup_logging(config: &EnvConfig) {
    let filter = EnvFilter::try_new(config.log_filter())
        .unwrap_or_else(|_| EnvFilter::new(patchwise_cli::config::DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(filter)
        .init();
}
