//! Fixed CPU requests and limits

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};

use super::{raise_cpu, ContainerPolicy, ResourcePolicySettings};
use crate::observability::BoostLogger;
use crate::pod::ResourceField;
use crate::units::CpuQuantity;

#[derive(Debug)]
pub struct FixedPolicy {
    requests: CpuQuantity,
    limits: CpuQuantity,
    logger: BoostLogger,
}

impl FixedPolicy {
    pub fn new(requests: CpuQuantity, limits: CpuQuantity, logger: BoostLogger) -> Self {
        Self {
            requests,
            limits,
            logger,
        }
    }

    pub fn requests(&self) -> CpuQuantity {
        self.requests
    }

    pub fn limits(&self) -> CpuQuantity {
        self.limits
    }
}

#[async_trait]
impl ContainerPolicy for FixedPolicy {
    fn settings(&self) -> ResourcePolicySettings {
        ResourcePolicySettings::Fixed {
            requests: self.requests,
            limits: self.limits,
        }
    }

    async fn new_resources(&self, container: &Container) -> Option<ResourceRequirements> {
        Some(raise_cpu(container, &self.logger, |field, _| match field {
            ResourceField::Requests => self.requests,
            ResourceField::Limits => self.limits,
        }))
    }
}
