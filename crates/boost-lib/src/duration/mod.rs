//! Boost duration policies
//!
//! A duration policy decides whether a pod's boost should still be applied.
//! An engine may carry several; they are evaluated in their configured
//! precedence order and the boost lapses as soon as one of them is no longer
//! valid.

mod auto;
mod fixed;
mod pod_condition;


pub use auto::AutoDurationPolicy;
pub use fixed::FixedDurationPolicy;
pub use pod_condition::PodConditionPolicy;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, DurationPolicyKind, DurationPolicySpec, PredictionClientConfig};
use crate::observability::{BoostLogger, BoostMetrics};
use crate::pod::creation_timestamp;
use crate::prediction::{PredictionClient, PredictionError};

#[derive(Debug, Error)]
pub enum DurationError {
    #[error("{policy} policy does not define a boost duration")]
    Unsupported { policy: DurationPolicyKind },

    #[error("duration prediction failed: {0}")]
    Prediction(#[from] PredictionError),
}

/// Configuration a duration policy was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationPolicySettings {
    Fixed(Duration),
    PodCondition {
        condition_type: String,
        status: String,
    },
    AutoPredicted {
        endpoint: String,
    },
}

/// Decides how long a pod keeps its boost
#[async_trait]
pub trait DurationPolicy: Send + Sync + fmt::Debug {
    fn kind(&self) -> DurationPolicyKind;

    fn settings(&self) -> DurationPolicySettings;

    /// Length of the boost window for the pod
    async fn duration(&self, pod: &Pod) -> Result<Duration, DurationError>;

    /// Whether the boost should still be applied at `now`
    async fn is_valid_at(&self, pod: &Pod, now: DateTime<Utc>) -> bool;

    async fn is_valid(&self, pod: &Pod) -> bool {
        self.is_valid_at(pod, Utc::now()).await
    }

    /// Called once the pod has been reverted
    async fn on_reverted(&self, _pod: &Pod) -> Result<(), DurationError> {
        Ok(())
    }
}

/// True while `now` is before the pod's creation time plus `duration`.
/// A pod without a creation timestamp is treated as expired.
pub(crate) fn within_window(pod: &Pod, duration: Duration, now: DateTime<Utc>) -> bool {
    let Some(created) = creation_timestamp(pod) else {
        return false;
    };
    let Ok(window) = chrono::Duration::from_std(duration) else {
        return true;
    };
    match created.checked_add_signed(window) {
        Some(deadline) => now < deadline,
        None => true,
    }
}

/// Build the declared duration policies in evaluation order.
///
/// A single declared policy needs no precedence list. With more than one,
/// `precedence` must name every declared policy exactly once.
pub fn from_spec(
    spec: &DurationPolicySpec,
    client_config: &PredictionClientConfig,
    logger: &BoostLogger,
    metrics: &BoostMetrics,
) -> Result<Vec<Arc<dyn DurationPolicy>>, ConfigError> {
    let order = evaluation_order(spec)?;
    let mut policies: Vec<Arc<dyn DurationPolicy>> = Vec::with_capacity(order.len());

    for kind in order {
        let policy: Arc<dyn DurationPolicy> = match kind {
            DurationPolicyKind::Fixed => {
                let fixed = spec.fixed.as_ref().ok_or(ConfigError::NoDurationPolicy)?;
                let duration = fixed.as_duration();
                if duration.is_zero() {
                    return Err(ConfigError::ZeroFixedDuration);
                }
                Arc::new(FixedDurationPolicy::new(duration))
            }
            DurationPolicyKind::PodCondition => {
                let condition = spec
                    .pod_condition
                    .as_ref()
                    .ok_or(ConfigError::NoDurationPolicy)?;
                if condition.condition_type.is_empty() || condition.status.is_empty() {
                    return Err(ConfigError::IncompletePodCondition);
                }
                Arc::new(PodConditionPolicy::new(
                    &condition.condition_type,
                    &condition.status,
                ))
            }
            DurationPolicyKind::Auto => {
                let auto = spec
                    .auto_policy
                    .as_ref()
                    .ok_or(ConfigError::NoDurationPolicy)?;
                let client = PredictionClient::new(&auto.api_endpoint, client_config.clone())
                    .map_err(|e| ConfigError::InvalidEndpoint {
                        endpoint: auto.api_endpoint.clone(),
                        reason: e.to_string(),
                    })?;
                Arc::new(AutoDurationPolicy::new(
                    client,
                    logger.component("auto-duration-policy"),
                    metrics.clone(),
                ))
            }
        };
        policies.push(policy);
    }

    Ok(policies)
}

fn evaluation_order(spec: &DurationPolicySpec) -> Result<Vec<DurationPolicyKind>, ConfigError> {
    let declared = spec.declared();
    if declared.is_empty() {
        return Err(ConfigError::NoDurationPolicy);
    }

    if spec.precedence.is_empty() {
        if declared.len() > 1 {
            return Err(ConfigError::AmbiguousDurationPolicy { declared });
        }
        return Ok(declared);
    }

    let mut sorted_precedence = spec.precedence.clone();
    sorted_precedence.sort_by_key(|k| k.as_str());
    sorted_precedence.dedup();
    let mut sorted_declared = declared.clone();
    sorted_declared.sort_by_key(|k| k.as_str());

    if sorted_precedence.len() != spec.precedence.len() || sorted_precedence != sorted_declared {
        return Err(ConfigError::PrecedenceMismatch {
            precedence: spec.precedence.clone(),
            declared,
        });
    }

    Ok(spec.precedence.clone())
}
