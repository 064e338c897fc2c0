//! HTTP client for the prediction service
//!
//! Every call carries a bounded timeout. Transport failures and 5xx responses
//! are retried with exponential backoff up to the configured cap; any other
//! status is returned to the caller immediately.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::PredictionClientConfig;
use crate::units::{DurationParseError, QuantityParseError};

/// Errors from the prediction service client
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("container image name is empty")]
    EmptyImage,

    #[error("invalid prediction endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code {status}")]
    Status { status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid predicted quantity: {0}")]
    InvalidQuantity(#[from] QuantityParseError),

    #[error("invalid predicted duration: {0}")]
    InvalidDuration(#[from] DurationParseError),
}

impl PredictionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PredictionError::Transport(_) => true,
            PredictionError::Status { status } => *status >= 500,
            _ => false,
        }
    }
}

/// `GET /cpu` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuPrediction {
    pub cpu_requests: String,
    pub cpu_limits: String,
}

/// `GET /duration` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationPrediction {
    pub duration: String,
}

/// `POST /notify` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub pod_name: String,
    pub pod_namespace: String,
}

/// Client for one prediction service endpoint
#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    endpoint: String,
    config: PredictionClientConfig,
}

impl PredictionClient {
    pub fn new(endpoint: &str, config: PredictionClientConfig) -> Result<Self, PredictionError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let parsed = Url::parse(&endpoint).map_err(|e| PredictionError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PredictionError::InvalidEndpoint {
                endpoint,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &PredictionClientConfig {
        &self.config
    }

    /// Predicted CPU requests and limits for an image
    pub async fn cpu(&self, image: &str) -> Result<CpuPrediction, PredictionError> {
        self.get_for_image("cpu", image).await
    }

    /// Predicted boost duration for an image
    pub async fn duration(&self, image: &str) -> Result<DurationPrediction, PredictionError> {
        self.get_for_image("duration", image).await
    }

    /// Tell the service a pod has been reverted. Anything but 200 is an error.
    pub async fn notify(&self, pod_name: &str, pod_namespace: &str) -> Result<(), PredictionError> {
        let url = self.url("notify", None)?;
        let body = NotifyRequest {
            pod_name: pod_name.to_string(),
            pod_namespace: pod_namespace.to_string(),
        };

        let response = self
            .send_with_retry("notify", || self.client.post(url.clone()).json(&body))
            .await?;

        if response.status() != StatusCode::OK {
            return Err(PredictionError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn get_for_image<T: DeserializeOwned>(
        &self,
        path: &str,
        image: &str,
    ) -> Result<T, PredictionError> {
        if image.is_empty() {
            return Err(PredictionError::EmptyImage);
        }

        let url = self.url(path, Some(image))?;
        let response = self
            .send_with_retry(path, || self.client.get(url.clone()))
            .await?;

        if !response.status().is_success() {
            return Err(PredictionError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let value = serde_json::from_slice(&body)?;
        debug!(endpoint = %self.endpoint, path = %path, image = %image, "Received prediction");
        Ok(value)
    }

    fn url(&self, path: &str, image: Option<&str>) -> Result<Url, PredictionError> {
        let mut url = Url::parse(&format!("{}/{}", self.endpoint, path)).map_err(|e| {
            PredictionError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        if let Some(image) = image {
            url.query_pairs_mut().append_pair("imageName", image);
        }
        Ok(url)
    }

    /// Send a request, retrying transport errors and 5xx responses.
    /// The final response is returned whatever its status.
    async fn send_with_retry<F>(
        &self,
        path: &str,
        build: F,
    ) -> Result<reqwest::Response, PredictionError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempts = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            attempts += 1;
            let exhausted = attempts > self.config.max_retries;

            let failure = match build().send().await {
                Ok(response) if !response.status().is_server_error() => return Ok(response),
                Ok(response) if exhausted => return Ok(response),
                Ok(response) => format!("status {}", response.status()),
                Err(e) if exhausted => return Err(PredictionError::Transport(e)),
                Err(e) => e.to_string(),
            };

            warn!(
                endpoint = %self.endpoint,
                path = %path,
                error = %failure,
                attempt = attempts,
                max_retries = self.config.max_retries,
                retry_delay_ms = backoff.as_millis() as u64,
                "Retrying prediction service request"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, self.config.max_backoff);
        }
    }
}
