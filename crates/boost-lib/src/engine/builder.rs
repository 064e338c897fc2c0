//! Engine construction and configuration validation

use std::collections::HashMap;
use std::sync::Arc;

use super::BoostEngine;
use crate::config::{BoostConfig, ConfigError, PredictionClientConfig};
use crate::duration;
use crate::observability::{BoostLogger, BoostMetrics};
use crate::resource;
use crate::store::PodStore;
use crate::updater::PodUpdater;

/// Builder for a [`BoostEngine`]
pub struct BoostEngineBuilder<'a> {
    config: &'a BoostConfig,
    updater: Arc<dyn PodUpdater>,
    prediction: PredictionClientConfig,
    metrics: Option<BoostMetrics>,
}

impl<'a> BoostEngineBuilder<'a> {
    pub fn new(config: &'a BoostConfig, updater: Arc<dyn PodUpdater>) -> Self {
        Self {
            config,
            updater,
            prediction: PredictionClientConfig::default(),
            metrics: None,
        }
    }

    /// Timeouts and retries for prediction service calls
    pub fn prediction_config(mut self, prediction: PredictionClientConfig) -> Self {
        self.prediction = prediction;
        self
    }

    pub fn metrics(mut self, metrics: BoostMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build the engine.
    /// Fails on the first invalid container or duration policy.
    pub fn build(self) -> Result<BoostEngine, ConfigError> {
        let config = self.config;
        let logger = BoostLogger::new(&config.name, &config.namespace);
        let metrics = self.metrics.unwrap_or_default();

        let mut resource_policies = HashMap::new();
        for spec in &config.resource_policy.container_policies {
            let policy = resource::from_spec(spec, &self.prediction, &logger, &metrics)?;
            if resource_policies
                .insert(spec.container_name.clone(), policy)
                .is_some()
            {
                return Err(ConfigError::DuplicateContainer {
                    container: spec.container_name.clone(),
                });
            }
        }

        let duration_order =
            duration::from_spec(&config.duration_policy, &self.prediction, &logger, &metrics)?;
        let duration_policies = duration_order
            .iter()
            .map(|p| (p.kind().as_str().to_string(), Arc::clone(p)))
            .collect();

        Ok(BoostEngine {
            name: config.name.clone(),
            namespace: config.namespace.clone(),
            resource_policies,
            duration_policies,
            duration_order,
            pods: PodStore::new(),
            updater: self.updater,
            logger,
            metrics,
        })
    }
}
