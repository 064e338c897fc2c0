//! CPU values predicted per container image by the prediction service

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};

use super::{raise_cpu, ContainerPolicy, ResourcePolicySettings};
use crate::observability::{BoostLogger, BoostMetrics};
use crate::pod::{container_image, ResourceField};
use crate::prediction::{PredictionCache, PredictionClient, PredictionError};
use crate::units::CpuQuantity;

const METRIC_KIND: &str = "cpu";

/// Validated CPU prediction for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictedCpu {
    pub requests: CpuQuantity,
    pub limits: CpuQuantity,
}

#[derive(Debug)]
pub struct AutoPolicy {
    client: PredictionClient,
    cache: PredictionCache<PredictedCpu>,
    logger: BoostLogger,
    metrics: BoostMetrics,
}

impl AutoPolicy {
    pub fn new(client: PredictionClient, logger: BoostLogger, metrics: BoostMetrics) -> Self {
        Self {
            client,
            cache: PredictionCache::new(),
            logger,
            metrics,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn cache(&self) -> &PredictionCache<PredictedCpu> {
        &self.cache
    }

    async fn prediction(&self, image: &str) -> Result<PredictedCpu, PredictionError> {
        if let Some(cached) = self.cache.get(image) {
            self.metrics.inc_prediction_cache_hits(METRIC_KIND);
            return Ok(cached);
        }

        let result = self.fetch(image).await;
        if !matches!(result, Err(PredictionError::EmptyImage)) {
            self.metrics
                .inc_prediction_requests(METRIC_KIND, result.is_ok());
        }
        let predicted = result?;
        self.cache.insert(image, predicted);
        Ok(predicted)
    }

    async fn fetch(&self, image: &str) -> Result<PredictedCpu, PredictionError> {
        let raw = self.client.cpu(image).await?;
        Ok(PredictedCpu {
            requests: CpuQuantity::parse(&raw.cpu_requests)?,
            limits: CpuQuantity::parse(&raw.cpu_limits)?,
        })
    }
}

#[async_trait]
impl ContainerPolicy for AutoPolicy {
    fn settings(&self) -> ResourcePolicySettings {
        ResourcePolicySettings::AutoPredicted {
            endpoint: self.client.endpoint().to_string(),
        }
    }

    async fn new_resources(&self, container: &Container) -> Option<ResourceRequirements> {
        let image = container_image(container);
        let predicted = match self.prediction(image).await {
            Ok(predicted) => predicted,
            Err(e) => {
                self.logger.log_prediction_failed(image, &e);
                return None;
            }
        };

        Some(raise_cpu(container, &self.logger, |field, _| match field {
            ResourceField::Requests => predicted.requests,
            ResourceField::Limits => predicted.limits,
        }))
    }

    fn on_reverted(&self, image: &str) {
        self.cache.remove(image);
    }
}
