//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use patchwise::SessionOptions;

pub const BACKEND_ENV_VAR: &str = "PATCHWISE_BACKEND";
pub const HTTP_CONFIG_PATH_ENV_VAR: &str = "PATCHWISE_HTTP_CONFIG_PATH";
pub const PROCESS_COMMAND_ENV_VAR: &str = "PATCHWISE_PROCESS_COMMAND";
pub const PROCESS_TIMEOUT_ENV_VAR: &str = "PATCHWISE_PROCESS_TIMEOUT_SEC";
pub const MODEL_ENV_VAR: &str = "PATCHWISE_MODEL";
pub const WORKSPACE_ENV_VAR: &str = "PATCHWISE_WORKSPACE";
pub const FILE_EXTENSIONS_ENV_VAR: &str = "PATCHWISE_FILE_EXTENSIONS";
pub const LOG_ENV_VAR: &str = "PATCHWISE_LOG";
pub const LOADING_HINT_ENV_VAR: &str = "PATCHWISE_LOADING_HINT";

pub const DEFAULT_LOG_FILTER: &str =
    "patchwise=info,patchwise_cli=info,backend_http=warn,backend_process=warn,workspace_fs=warn";

/// Raw startup settings. Blank variables count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub backend: Option<String>,
    pub http_config_path: Option<PathBuf>,
    pub process_command: Option<String>,
    pub process_timeout_sec: Option<String>,
    pub model: Option<String>,
    pub workspace: Option<PathBuf>,
    pub file_extensions: Vec<String>,
    pub loading_hint: Option<String>,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            backend: env_string_opt(BACKEND_ENV_VAR).map(|value| value.trim().to_string()),
            http_config_path: env_string_opt(HTTP_CONFIG_PATH_ENV_VAR).map(PathBuf::from),
            process_command: env_string_opt(PROCESS_COMMAND_ENV_VAR),
            process_timeout_sec: env_string_opt(PROCESS_TIMEOUT_ENV_VAR),
            model: env_string_opt(MODEL_ENV_VAR).map(|value| value.trim().to_string()),
            workspace: env_string_opt(WORKSPACE_ENV_VAR).map(PathBuf::from),
            file_extensions: env_string_opt(FILE_EXTENSIONS_ENV_VAR)
                .map(|value| split_list(&value))
                .unwrap_or_default(),
            loading_hint: env_string_opt(LOADING_HINT_ENV_VAR),
            log_filter: env_string_opt(LOG_ENV_VAR),
        }
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn workspace_root(&self) -> anyhow::Result<PathBuf> {
        match &self.workspace {
            Some(path) => Ok(path.clone()),
            None => env::current_dir().context("failed to read the current directory"),
        }
    }

    pub fn process_timeout(&self) -> anyhow::Result<Option<Duration>> {
        let Some(raw) = self.process_timeout_sec.as_deref() else {
            return Ok(None);
        };

        let seconds: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("{PROCESS_TIMEOUT_ENV_VAR} must be a whole number of seconds"))?;
        if seconds == 0 {
            bail!("{PROCESS_TIMEOUT_ENV_VAR} must be greater than zero");
        }
        Ok(Some(Duration::from_secs(seconds)))
    }

    /// Session options for a backend whose default model is `default_model`.
    pub fn session_options(&self, default_model: &str) -> SessionOptions {
        let mut options = SessionOptions::default()
            .with_model(self.model.as_deref().unwrap_or(default_model))
            .with_accepted_extensions(self.file_extensions.iter().cloned());
        if let Some(hint) = &self.loading_hint {
            options = options.with_loading_hint(hint.trim());
        }
        options
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
