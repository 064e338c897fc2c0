//! Boost until the pod reports a condition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use std::time::Duration;

use super::{DurationError, DurationPolicy, DurationPolicySettings};
use crate::config::DurationPolicyKind;
use crate::pod::has_condition;

#[derive(Debug, Clone)]
pub struct PodConditionPolicy {
    condition_type: String,
    status: String,
}

impl PodConditionPolicy {
    pub fn new(condition_type: &str, status: &str) -> Self {
        Self {
            condition_type: condition_type.to_string(),
            status: status.to_string(),
        }
    }
}

#[async_trait]
impl DurationPolicy for PodConditionPolicy {
    fn kind(&self) -> DurationPolicyKind {
        DurationPolicyKind::PodCondition
    }

    fn settings(&self) -> DurationPolicySettings {
        DurationPolicySettings::PodCondition {
            condition_type: self.condition_type.clone(),
            status: self.status.clone(),
        }
    }

    async fn duration(&self, _pod: &Pod) -> Result<Duration, DurationError> {
        Err(DurationError::Unsupported {
            policy: self.kind(),
        })
    }

    async fn is_valid_at(&self, pod: &Pod, _now: DateTime<Utc>) -> bool {
        !has_condition(pod, &self.condition_type, &self.status)
    }
}
