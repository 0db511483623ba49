use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use backend_channel::BackendChannel;
use backend_channel_mock::{ScriptedBackend, MOCK_BACKEND_ID};
use backend_http::{HttpBackend, HttpBackendConfig, HTTP_BACKEND_ID};
use backend_process::{ProcessBackend, ProcessBackendConfig, PROCESS_BACKEND_ID};

use crate::config::{
    EnvConfig, BACKEND_ENV_VAR, HTTP_CONFIG_PATH_ENV_VAR, PROCESS_COMMAND_ENV_VAR,
};

pub const DEFAULT_BACKEND_ID: &str = MOCK_BACKEND_ID;

/// Builds the backend named by `PATCHWISE_BACKEND`.
///
/// `workspace` becomes the process backend's working directory.
pub fn backend_from_config(
    config: &EnvConfig,
    workspace: &Path,
) -> anyhow::Result<Arc<dyn BackendChannel>> {
    let backend_id = config.backend.as_deref().unwrap_or(DEFAULT_BACKEND_ID);

    match backend_id {
        MOCK_BACKEND_ID => Ok(Arc::new(ScriptedBackend::default())),
        HTTP_BACKEND_ID => {
            let path = config.http_config_path.as_deref().ok_or_else(|| {
                anyhow!("{HTTP_CONFIG_PATH_ENV_VAR} must be set when {BACKEND_ENV_VAR}={HTTP_BACKEND_ID}")
            })?;
            let http_config = HttpBackendConfig::load(path)
                .with_context(|| format!("invalid HTTP backend config {}", path.display()))?;
            let backend = HttpBackend::new(http_config).context("failed to build HTTP client")?;
            Ok(Arc::new(backend))
        }
        PROCESS_BACKEND_ID => {
            let command = config.process_command.as_deref().ok_or_else(|| {
                anyhow!("{PROCESS_COMMAND_ENV_VAR} must be set when {BACKEND_ENV_VAR}={PROCESS_BACKEND_ID}")
            })?;
            let mut process_config = ProcessBackendConfig::from_command_line(command)
                .with_context(|| format!("invalid {PROCESS_COMMAND_ENV_VAR}"))?
                .with_working_dir(workspace);
            if let Some(timeout) = config.process_timeout()? {
                process_config = process_config.with_timeout(timeout);
            }
            if let Some(model) = &config.model {
                process_config = process_config.with_model(model.as_str());
            }
            Ok(Arc::new(ProcessBackend::new(process_config)?))
        }
        unknown => bail!(
            "Unsupported backend '{unknown}'. Available backends: {MOCK_BACKEND_ID}, {HTTP_BACKEND_ID}, {PROCESS_BACKEND_ID}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(backend: &str) -> EnvConfig {
        EnvConfig {
            backend: Some(backend.to_string()),
            ..EnvConfig::default()
        }
    }

    fn error_text(result: anyhow::Result<Arc<dyn BackendChannel>>) -> String {
        match result {
            Ok(_) => panic!("backend selection should fail"),
            Err(error) => format!("{error:#}"),
        }
    }

    #[test]
    fn mock_is_the_default_backend() {
        let backend =
            backend_from_config(&EnvConfig::default(), Path::new(".")).expect("mock backend");

        assert_eq!(backend.profile().backend_id, MOCK_BACKEND_ID);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let error = error_text(backend_from_config(&config("grpc"), Path::new(".")));

        assert!(error.contains("Unsupported backend 'grpc'"), "{error}");
    }

    #[test]
    fn http_backend_requires_config_path() {
        let error = error_text(backend_from_config(&config("http"), Path::new(".")));

        assert!(error.contains(HTTP_CONFIG_PATH_ENV_VAR), "{error}");
    }

    #[test]
    fn http_backend_reads_config_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("http.json");
        std::fs::write(
            &path,
            r#"{"endpoint": "http://127.0.0.1:9", "models": ["small", "large"]}"#,
        )
        .expect("write config");
        let config = EnvConfig {
            http_config_path: Some(path),
            ..config("http")
        };

        let backend = backend_from_config(&config, dir.path()).expect("http backend");

        assert_eq!(backend.profile().backend_id, HTTP_BACKEND_ID);
        assert_eq!(backend.models(), vec!["small", "large"]);
    }

    #[test]
    fn http_backend_reports_unreadable_config() {
        let config = EnvConfig {
            http_config_path: Some(PathBuf::from("/nonexistent/http.json")),
            ..config("http")
        };

        let error = error_text(backend_from_config(&config, Path::new(".")));

        assert!(error.contains("/nonexistent/http.json"), "{error}");
    }

    #[test]
    fn process_backend_uses_command_and_model() {
        let config = EnvConfig {
            process_command: Some("python3 -m proposer".to_string()),
            model: Some("local".to_string()),
            ..config("process")
        };

        let backend = backend_from_config(&config, Path::new(".")).expect("process backend");

        assert_eq!(backend.profile().backend_id, PROCESS_BACKEND_ID);
        assert_eq!(backend.profile().default_model, "local");
    }

    #[test]
    fn process_backend_requires_command() {
        let error = error_text(backend_from_config(&config("process"), Path::new(".")));

        assert!(error.contains(PROCESS_COMMAND_ENV_VAR), "{error}");
    }
}
