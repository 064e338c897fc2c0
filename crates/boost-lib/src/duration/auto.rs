//! Boost duration predicted per image by the prediction service

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use std::time::Duration;

use super::{within_window, DurationError, DurationPolicy, DurationPolicySettings};
use crate::config::DurationPolicyKind;
use crate::observability::{BoostLogger, BoostMetrics};
use crate::pod::{first_container_image, pod_name, pod_namespace};
use crate::prediction::{PredictionCache, PredictionClient, PredictionError};
use crate::units::parse_duration;

const METRIC_KIND: &str = "duration";

#[derive(Debug)]
pub struct AutoDurationPolicy {
    client: PredictionClient,
    cache: PredictionCache<Duration>,
    logger: BoostLogger,
    metrics: BoostMetrics,
}

impl AutoDurationPolicy {
    pub fn new(client: PredictionClient, logger: BoostLogger, metrics: BoostMetrics) -> Self {
        Self {
            client,
            cache: PredictionCache::new(),
            logger,
            metrics,
        }
    }

    pub fn cache(&self) -> &PredictionCache<Duration> {
        &self.cache
    }

    async fn fetch(&self, image: &str) -> Result<Duration, PredictionError> {
        let raw = self.client.duration(image).await?;
        Ok(parse_duration(&raw.duration)?)
    }
}

#[async_trait]
impl DurationPolicy for AutoDurationPolicy {
    fn kind(&self) -> DurationPolicyKind {
        DurationPolicyKind::Auto
    }

    fn settings(&self) -> DurationPolicySettings {
        DurationPolicySettings::AutoPredicted {
            endpoint: self.client.endpoint().to_string(),
        }
    }

    async fn duration(&self, pod: &Pod) -> Result<Duration, DurationError> {
        let image = first_container_image(pod);
        if let Some(cached) = self.cache.get(image) {
            self.metrics.inc_prediction_cache_hits(METRIC_KIND);
            self.logger.log_predicted_duration(image, cached, true);
            return Ok(cached);
        }

        let result = self.fetch(image).await;
        if !matches!(result, Err(PredictionError::EmptyImage)) {
            self.metrics
                .inc_prediction_requests(METRIC_KIND, result.is_ok());
        }
        let duration = result?;
        self.cache.insert(image, duration);
        self.logger.log_predicted_duration(image, duration, false);
        Ok(duration)
    }

    async fn is_valid_at(&self, pod: &Pod, now: DateTime<Utc>) -> bool {
        match self.duration(pod).await {
            Ok(duration) => within_window(pod, duration, now),
            Err(e) => {
                self.logger
                    .log_policy_error(pod_name(pod), self.kind().as_str(), &e);
                false
            }
        }
    }

    /// Drops the cached duration for the pod's image and tells the prediction
    /// service the pod was reverted. Notification failures are only logged.
    async fn on_reverted(&self, pod: &Pod) -> Result<(), DurationError> {
        self.cache.remove(first_container_image(pod));

        if let Err(e) = self.client.notify(pod_name(pod), pod_namespace(pod)).await {
            self.logger.log_notify_failed(pod_name(pod), &e);
        }
        Ok(())
    }
}
