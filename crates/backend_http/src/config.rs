use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::HttpBackendError;
use crate::retry::default_retry_base_delay;
use crate::url::DEFAULT_BACKEND_URL;

/// Transport configuration for the HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBackendConfig {
    /// Base URL or full proposal endpoint.
    pub endpoint: String,
    /// Model ids offered by the backend. The first is the default.
    pub models: Vec<String>,
    /// Optional bearer token sent as `Authorization`.
    pub api_key: Option<String>,
    /// Optional whole-request timeout.
    pub timeout: Option<Duration>,
    pub retry_base_delay: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_BACKEND_URL.to_string(),
            models: Vec::new(),
            api_key: None,
            timeout: None,
            retry_base_delay: default_retry_base_delay(),
        }
    }
}

/// On-disk shape of the HTTP backend config file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpConfigFile {
    endpoint: String,
    models: Vec<String>,
    #[serde(default)]
    timeout_sec: Option<u64>,
    #[serde(default)]
    api_key: Option<String>,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            models,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn load(path: &Path) -> Result<Self, HttpBackendError> {
        let raw = fs::read_to_string(path).map_err(|error| HttpBackendError::ConfigRead {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, HttpBackendError> {
        let file: HttpConfigFile = serde_json::from_str(raw)
            .map_err(|error| HttpBackendError::InvalidConfig(error.to_string()))?;

        let endpoint = file.endpoint.trim().to_string();
        if endpoint.is_empty() {
            return Err(HttpBackendError::InvalidConfig(
                "`endpoint` must not be empty".to_string(),
            ));
        }

        let models: Vec<String> = file
            .models
            .into_iter()
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .collect();
        if models.is_empty() {
            return Err(HttpBackendError::InvalidConfig(
                "`models` must list at least one model id".to_string(),
            ));
        }

        let mut config = Self::new(endpoint, models);
        match file.timeout_sec {
            Some(0) => {
                return Err(HttpBackendError::InvalidConfig(
                    "`timeout_sec` must be greater than zero".to_string(),
                ))
            }
            Some(seconds) => config = config.with_timeout(Duration::from_secs(seconds)),
            None => {}
        }
        if let Some(api_key) = file.api_key.filter(|key| !key.trim().is_empty()) {
            config = config.with_api_key(api_key.trim());
        }

        Ok(config)
    }
}
