//! Startup CPU boost engine
//!
//! This crate provides:
//! - Container resource policies that compute boosted CPU values
//! - Duration policies that decide when a boost lapses
//! - A per-image prediction client and cache for the auto policies
//! - The per-boost engine tracking pods and reverting them
//! - Health checks and observability

pub mod annotation;
pub mod config;
pub mod duration;
pub mod engine;
pub mod health;
pub mod observability;
pub mod pod;
pub mod prediction;
pub mod registry;
pub mod resource;
pub mod store;
pub mod units;
pub mod updater;

pub use annotation::{revert_pod, BoostAnnotation, RevertedPod};
pub use config::{BoostConfig, ConfigError, PredictionClientConfig};
pub use duration::{DurationError, DurationPolicy, DurationPolicySettings};
pub use engine::{BoostEngine, BoostEngineBuilder, BoostError};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use observability::{BoostLogger, BoostMetrics};
pub use registry::BoostRegistry;
pub use resource::{ContainerPolicy, ResourcePolicySettings};
pub use store::{PodStore, TrackedPod};
pub use updater::{KubePodUpdater, PodUpdater, UpdateError};
