//! Percentage increase over the container's current CPU values

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};

use super::{raise_cpu, ContainerPolicy, ResourcePolicySettings};
use crate::observability::BoostLogger;

#[derive(Debug)]
pub struct PercentagePolicy {
    percentage: i64,
    logger: BoostLogger,
}

impl PercentagePolicy {
    pub fn new(percentage: i64, logger: BoostLogger) -> Self {
        Self { percentage, logger }
    }

    pub fn percentage(&self) -> i64 {
        self.percentage
    }
}

#[async_trait]
impl ContainerPolicy for PercentagePolicy {
    fn settings(&self) -> ResourcePolicySettings {
        ResourcePolicySettings::Percentage {
            value: self.percentage,
        }
    }

    async fn new_resources(&self, container: &Container) -> Option<ResourceRequirements> {
        Some(raise_cpu(container, &self.logger, |_, current| {
            current.increased_by_percent(self.percentage)
        }))
    }
}
