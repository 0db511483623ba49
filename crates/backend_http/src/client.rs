use backend_channel::{BackendRequest, RawReply};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};

use crate::config::HttpBackendConfig;
use crate::error::{parse_error_message, HttpBackendError};
use crate::retry::{is_retryable_http_error, retry_delay, MAX_RETRIES};
use crate::url::normalize_endpoint;

#[derive(Debug)]
pub struct HttpBackendClient {
    http: Client,
    config: HttpBackendConfig,
}

impl HttpBackendClient {
    pub fn new(config: HttpBackendConfig) -> Result<Self, HttpBackendError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(HttpBackendError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_endpoint(&self.config.endpoint)
    }

    pub fn build_request(&self, request: &BackendRequest) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .post(self.normalized_endpoint())
            .header(ACCEPT, "application/json")
            .json(request);

        match self.config.api_key.as_deref() {
            Some(api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }

    /// Posts `request` and returns the parsed JSON reply.
    ///
    /// Retryable statuses and connection errors are retried up to
    /// [`MAX_RETRIES`] times with exponential backoff. Any other transport
    /// error, timeouts included, fails on the first attempt.
    pub async fn send_with_retry(
        &self,
        request: &BackendRequest,
    ) -> Result<RawReply, HttpBackendError> {
        let endpoint = self.normalized_endpoint();
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.build_request(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(HttpBackendError::from)?;

                    if status.is_success() {
                        return serde_json::from_str(&body)
                            .map_err(|error| HttpBackendError::invalid_reply(&error, &body));
                    }

                    let message = parse_error_message(status, &body);
                    last_status = Some(status);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tracing::warn!(
                            status = status.as_u16(),
                            attempt,
                            %message,
                            "retrying backend request"
                        );
                        tokio::time::sleep(retry_delay(self.config.retry_base_delay, attempt))
                            .await;
                        continue;
                    }

                    return Err(HttpBackendError::Status(status, message));
                }
                Err(error) if error.is_timeout() => {
                    return Err(HttpBackendError::Timeout(error.to_string()));
                }
                Err(error) if error.is_connect() => {
                    let message = error.to_string();

                    if attempt < MAX_RETRIES {
                        tracing::warn!(attempt, %message, "backend unreachable, retrying");
                        tokio::time::sleep(retry_delay(self.config.retry_base_delay, attempt))
                            .await;
                        continue;
                    }

                    return Err(HttpBackendError::Unreachable { endpoint, message });
                }
                Err(error) => return Err(HttpBackendError::from(error)),
            }
        }

        Err(HttpBackendError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }
}
