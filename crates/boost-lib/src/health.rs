//! Health and readiness tracking for the boost agent
//!
//! Components report their status; the agent is ready once its boost engines
//! are loaded and no component is unhealthy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Status of a single component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Working normally
    Healthy,
    /// Working, with errors worth surfacing
    Degraded,
    /// Not working; the agent is not ready
    Unhealthy,
}

/// Last reported health of a component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    /// Reason for a degraded or unhealthy status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When this status was reported
    pub since: DateTime<Utc>,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status among the components
    pub status: ComponentStatus,
    /// Health keyed by component name
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components; healthy when there are none
    pub fn overall(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    pub const KUBERNETES: &str = "kubernetes";
    pub const ENGINES: &str = "engines";
}

#[derive(Debug, Default)]
struct HealthState {
    components: HashMap<String, ComponentHealth>,
    ready: bool,
}

/// Shared component health; clones refer to the same state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, component: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(component.to_string(), health);
    }

    pub async fn set_healthy(&self, component: &str) {
        self.set(component, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, component: &str, message: impl Into<String>) {
        self.set(component, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, component: &str, message: impl Into<String>) {
        self.set(component, ComponentHealth::unhealthy(message)).await;
    }

    /// Mark the boost engines as loaded
    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        HealthResponse {
            status: HealthResponse::overall(&components),
            components,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = if !state.ready {
            Some("boost engines not loaded".to_string())
        } else {
            state
                .components
                .iter()
                .find(|(_, health)| health.status == ComponentStatus::Unhealthy)
                .map(|(name, _)| format!("component {} is unhealthy", name))
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
