//! Boost for a fixed time after pod creation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use std::time::Duration;

use super::{within_window, DurationError, DurationPolicy, DurationPolicySettings};
use crate::config::DurationPolicyKind;

#[derive(Debug, Clone)]
pub struct FixedDurationPolicy {
    duration: Duration,
}

impl FixedDurationPolicy {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl DurationPolicy for FixedDurationPolicy {
    fn kind(&self) -> DurationPolicyKind {
        DurationPolicyKind::Fixed
    }

    fn settings(&self) -> DurationPolicySettings {
        DurationPolicySettings::Fixed(self.duration)
    }

    async fn duration(&self, _pod: &Pod) -> Result<Duration, DurationError> {
        Ok(self.duration)
    }

    async fn is_valid_at(&self, pod: &Pod, now: DateTime<Utc>) -> bool {
        within_window(pod, self.duration, now)
    }
}
