//! Persisting pod changes to the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, PostParams};
use kube::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::pod::{pod_name, pod_namespace};

/// Errors from a pod update, split by whether a later reconcile may succeed
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("pod was modified concurrently: {0}")]
    Conflict(String),

    #[error("transient API failure: {0}")]
    Transient(String),

    #[error("update timed out after {0:?}")]
    Timeout(Duration),

    #[error("update rejected: {0}")]
    Rejected(String),
}

impl UpdateError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpdateError::Rejected(_))
    }
}

/// Persists a pod's spec. Implementations perform a single attempt.
#[async_trait]
pub trait PodUpdater: Send + Sync {
    async fn update(&self, pod: &Pod) -> Result<(), UpdateError>;
}

/// `PodUpdater` backed by a `PUT` on the pod resource
#[derive(Clone)]
pub struct KubePodUpdater {
    client: Client,
    timeout: Duration,
}

impl KubePodUpdater {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl PodUpdater for KubePodUpdater {
    async fn update(&self, pod: &Pod) -> Result<(), UpdateError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), pod_namespace(pod));
        let name = pod_name(pod);

        let replaced =
            with_timeout(self.timeout, api.replace(name, &PostParams::default(), pod)).await?;

        debug!(
            pod_name = %name,
            namespace = %pod_namespace(pod),
            resource_version = ?replaced.metadata.resource_version,
            "Pod updated"
        );
        Ok(())
    }
}

/// Run a Kubernetes API call within `timeout`, classifying its failure
pub async fn with_timeout<F, T>(timeout: Duration, call: F) -> Result<T, UpdateError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| UpdateError::Timeout(timeout))?
        .map_err(classify_kube_error)
}

/// Map a Kubernetes client error onto the update error classes.
/// 409 is a conflict, 429 and 5xx are transient, other API statuses are rejections.
/// Errors that never reached the API server are transient.
pub fn classify_kube_error(error: kube::Error) -> UpdateError {
    match error {
        kube::Error::Api(response) => match response.code {
            409 => UpdateError::Conflict(response.message),
            429 | 500..=599 => UpdateError::Transient(response.message),
            _ => UpdateError::Rejected(format!("{} ({})", response.message, response.code)),
        },
        other => UpdateError::Transient(other.to_string()),
    }
}
