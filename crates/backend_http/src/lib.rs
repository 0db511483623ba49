//! HTTP/JSON transport for the backend channel.
//!
//! Each request is one `POST` of the camelCase request JSON to the proposal
//! endpoint; the response body is returned as the opaque reply. Classifying
//! that reply is the caller's job.

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod url;

use std::sync::Arc;

use backend_channel::{BackendChannel, BackendError, BackendProfile, BackendRequest, RawReply};

pub use client::HttpBackendClient;
pub use config::HttpBackendConfig;
pub use error::HttpBackendError;
pub use url::normalize_endpoint;

/// Stable backend identifier used by startup selection.
pub const HTTP_BACKEND_ID: &str = "http";
const DEFAULT_HTTP_MODEL: &str = "default";

trait Exchange: Send + Sync {
    fn exchange(&self, request: &BackendRequest) -> Result<RawReply, HttpBackendError>;
}

#[derive(Debug)]
struct DefaultExchange {
    client: HttpBackendClient,
}

impl Exchange for DefaultExchange {
    fn exchange(&self, request: &BackendRequest) -> Result<RawReply, HttpBackendError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                HttpBackendError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(self.client.send_with_retry(request))
    }
}

/// `BackendChannel` backed by a blocking round trip over HTTP.
pub struct HttpBackend {
    model_ids: Vec<String>,
    endpoint: String,
    exchange: Arc<dyn Exchange>,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, HttpBackendError> {
        let model_ids = sanitize_model_ids(config.models.clone());
        let endpoint = normalize_endpoint(&config.endpoint);
        let exchange = Arc::new(DefaultExchange {
            client: HttpBackendClient::new(config)?,
        });

        Ok(Self {
            model_ids,
            endpoint,
            exchange,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[cfg(test)]
    fn with_exchange_for_tests(model_ids: Vec<String>, exchange: Arc<dyn Exchange>) -> Self {
        Self {
            model_ids: sanitize_model_ids(model_ids),
            endpoint: normalize_endpoint(""),
            exchange,
        }
    }
}

impl BackendChannel for HttpBackend {
    fn profile(&self) -> BackendProfile {
        BackendProfile {
            backend_id: HTTP_BACKEND_ID.to_string(),
            default_model: self.model_ids[0].clone(),
        }
    }

    fn models(&self) -> Vec<String> {
        self.model_ids.clone()
    }

    fn send(&self, request: BackendRequest) -> Result<RawReply, BackendError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            context_files = request.context_files.len(),
            "sending backend request"
        );

        self.exchange.exchange(&request).map_err(|error| {
            tracing::warn!(endpoint = %self.endpoint, %error, "backend request failed");
            error.into_backend_error()
        })
    }
}

fn sanitize_model_ids(model_ids: Vec<String>) -> Vec<String> {
    let mut sanitized: Vec<String> = model_ids
        .into_iter()
        .map(|model_id| model_id.trim().to_string())
        .filter(|model_id| !model_id.is_empty())
        .collect();

    if sanitized.is_empty() {
        sanitized.push(DEFAULT_HTTP_MODEL.to_string());
    }

    sanitized
}
