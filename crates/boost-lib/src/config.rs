//! Boost configuration consumed by the engine
//!
//! These types mirror the `StartupCPUBoost` resource layout. They arrive
//! already deserialized; the engine validates the policy selection when it is
//! constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::units::QuantityParseError;

/// A single boost definition: which containers get boosted, by how much, and for how long
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostConfig {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub resource_policy: ResourcePolicySpec,
    #[serde(default)]
    pub duration_policy: DurationPolicySpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePolicySpec {
    #[serde(default)]
    pub container_policies: Vec<ContainerPolicySpec>,
}

/// Resource policy selection for one container. Exactly one variant must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPolicySpec {
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_increase: Option<PercentageIncrease>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_resources: Option<FixedResources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_policy: Option<AutoPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentageIncrease {
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedResources {
    pub requests: String,
    pub limits: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPolicy {
    pub api_endpoint: String,
}

/// Duration policy selection. At least one variant must be set; when more
/// than one is set, `precedence` must list every declared variant once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<FixedDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_condition: Option<PodConditionDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_policy: Option<AutoPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precedence: Vec<DurationPolicyKind>,
}

impl DurationPolicySpec {
    /// Declared policy kinds in declaration order
    pub fn declared(&self) -> Vec<DurationPolicyKind> {
        let mut kinds = Vec::new();
        if self.fixed.is_some() {
            kinds.push(DurationPolicyKind::Fixed);
        }
        if self.pod_condition.is_some() {
            kinds.push(DurationPolicyKind::PodCondition);
        }
        if self.auto_policy.is_some() {
            kinds.push(DurationPolicyKind::Auto);
        }
        kinds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    Seconds,
    Minutes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedDuration {
    pub unit: DurationUnit,
    pub value: u64,
}

impl FixedDuration {
    pub fn as_duration(&self) -> Duration {
        match self.unit {
            DurationUnit::Seconds => Duration::from_secs(self.value),
            DurationUnit::Minutes => Duration::from_secs(self.value.saturating_mul(60)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodConditionDuration {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

/// Closed set of duration policy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationPolicyKind {
    #[serde(rename = "FixedDuration")]
    Fixed,
    #[serde(rename = "PodCondition")]
    PodCondition,
    #[serde(rename = "AutoDuration")]
    Auto,
}

impl DurationPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationPolicyKind::Fixed => "FixedDuration",
            DurationPolicyKind::PodCondition => "PodCondition",
            DurationPolicyKind::Auto => "AutoDuration",
        }
    }
}

impl fmt::Display for DurationPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP behaviour for prediction and notification calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictionClientConfig {
    /// Per-attempt request timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Additional attempts after the first one; only transport errors and 5xx are retried
    pub max_retries: u32,
    #[serde(with = "duration_secs")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_secs")]
    pub max_backoff: Duration,
}

impl Default for PredictionClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Configuration errors; fatal at engine construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("container {container:?} has no resource policy")]
    MissingResourcePolicy { container: String },

    #[error("container {container:?} declares more than one resource policy")]
    MultipleResourcePolicies { container: String },

    #[error("container {container:?} is declared more than once")]
    DuplicateContainer { container: String },

    #[error("container policy has an empty container name")]
    EmptyContainerName,

    #[error("invalid percentage {value} for container {container:?}")]
    InvalidPercentage { container: String, value: i64 },

    #[error("invalid fixed quantity for container {container:?}: {source}")]
    InvalidQuantity {
        container: String,
        #[source]
        source: QuantityParseError,
    },

    #[error("no duration policy declared")]
    NoDurationPolicy,

    #[error("fixed duration policy must be longer than zero")]
    ZeroFixedDuration,

    #[error("pod condition duration policy requires a condition type and status")]
    IncompletePodCondition,

    #[error("duration policies {declared:?} are declared without a precedence order")]
    AmbiguousDurationPolicy { declared: Vec<DurationPolicyKind> },

    #[error("precedence {precedence:?} does not match declared duration policies {declared:?}")]
    PrecedenceMismatch {
        precedence: Vec<DurationPolicyKind>,
        declared: Vec<DurationPolicyKind>,
    },

    #[error("invalid prediction endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}
