//! Container resource policies
//!
//! A resource policy computes the boosted CPU requests and limits for one
//! container. Policies never lower a value the container already has: a
//! candidate only replaces the current value when it is strictly greater.

mod auto;
mod fixed;
mod percentage;

#[cfg(test)]
mod tests;

pub use auto::{AutoPolicy, PredictedCpu};
pub use fixed::FixedPolicy;
pub use percentage::PercentagePolicy;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, ContainerPolicySpec, PredictionClientConfig};
use crate::observability::{BoostLogger, BoostMetrics};
use crate::pod::{cpu_of, set_cpu, ResourceField};
use crate::prediction::PredictionClient;
use crate::units::CpuQuantity;

/// Largest accepted percentage increase
pub const MAX_PERCENTAGE_INCREASE: i64 = 10_000;

/// Configuration a resource policy was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePolicySettings {
    Percentage { value: i64 },
    Fixed { requests: CpuQuantity, limits: CpuQuantity },
    AutoPredicted { endpoint: String },
}

/// Computes boosted resources for a container
#[async_trait]
pub trait ContainerPolicy: Send + Sync + fmt::Debug {
    fn settings(&self) -> ResourcePolicySettings;

    /// Boosted resource requirements, or `None` when the policy has nothing to apply
    async fn new_resources(&self, container: &Container) -> Option<ResourceRequirements>;

    /// Called after a pod using this policy was reverted
    fn on_reverted(&self, _image: &str) {}
}

/// Build the resource policy selected by a container policy declaration
pub fn from_spec(
    spec: &ContainerPolicySpec,
    client_config: &PredictionClientConfig,
    logger: &BoostLogger,
    metrics: &BoostMetrics,
) -> Result<Arc<dyn ContainerPolicy>, ConfigError> {
    let container = spec.container_name.clone();
    if container.is_empty() {
        return Err(ConfigError::EmptyContainerName);
    }

    let declared = [
        spec.percentage_increase.is_some(),
        spec.fixed_resources.is_some(),
        spec.auto_policy.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();

    match declared {
        0 => return Err(ConfigError::MissingResourcePolicy { container }),
        1 => {}
        _ => return Err(ConfigError::MultipleResourcePolicies { container }),
    }

    if let Some(percentage) = &spec.percentage_increase {
        if percentage.value <= 0 || percentage.value > MAX_PERCENTAGE_INCREASE {
            return Err(ConfigError::InvalidPercentage {
                container,
                value: percentage.value,
            });
        }
        return Ok(Arc::new(PercentagePolicy::new(
            percentage.value,
            logger.component("percentage-cpu-policy"),
        )));
    }

    if let Some(fixed) = &spec.fixed_resources {
        let parse = |raw: &str| {
            CpuQuantity::parse(raw).map_err(|source| ConfigError::InvalidQuantity {
                container: container.clone(),
                source,
            })
        };
        return Ok(Arc::new(FixedPolicy::new(
            parse(&fixed.requests)?,
            parse(&fixed.limits)?,
            logger.component("fixed-cpu-policy"),
        )));
    }

    let auto = spec
        .auto_policy
        .as_ref()
        .ok_or(ConfigError::MissingResourcePolicy {
            container: container.clone(),
        })?;
    let client = PredictionClient::new(&auto.api_endpoint, client_config.clone()).map_err(|e| {
        ConfigError::InvalidEndpoint {
            endpoint: auto.api_endpoint.clone(),
            reason: e.to_string(),
        }
    })?;
    Ok(Arc::new(AutoPolicy::new(
        client,
        logger.component("auto-cpu-policy"),
        metrics.clone(),
    )))
}

/// Copy of the container's resources with each CPU field raised to the
/// candidate computed from its current value, where that is an increase.
/// Unset and unparseable fields are left alone.
pub(crate) fn raise_cpu<F>(
    container: &Container,
    logger: &BoostLogger,
    candidate_for: F,
) -> ResourceRequirements
where
    F: Fn(ResourceField, CpuQuantity) -> CpuQuantity,
{
    let mut result = container.resources.clone().unwrap_or_default();

    for field in [ResourceField::Requests, ResourceField::Limits] {
        let current = match cpu_of(&result, field) {
            Ok(Some(current)) => current,
            Ok(None) => continue,
            Err(e) => {
                logger.log_invalid_current(&container.name, field.as_str(), &e);
                continue;
            }
        };

        let candidate = candidate_for(field, current);
        if candidate.is_zero() {
            continue;
        }
        if candidate > current {
            set_cpu(&mut result, field, candidate.to_quantity());
        } else {
            logger.log_resource_kept(
                &container.name,
                field.as_str(),
                &current.to_string(),
                &candidate.to_string(),
            );
        }
    }

    result
}
