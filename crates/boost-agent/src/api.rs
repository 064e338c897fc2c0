//! HTTP API for health checks, Prometheus metrics and boost status

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use boost_lib::{BoostRegistry, ComponentStatus, HealthRegistry};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub boosts: Arc<BoostRegistry>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, boosts: Arc<BoostRegistry>) -> Self {
        Self {
            health_registry,
            boosts,
        }
    }
}

/// Per-boost status entry served by `/boosts`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostStatus {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<String>,
    pub duration_policies: Vec<String>,
    pub tracked_pods: usize,
    pub boosted_pods: usize,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Loaded boosts with their pod counts
async fn boosts(State(state): State<Arc<AppState>>) -> Json<Vec<BoostStatus>> {
    let statuses = state
        .boosts
        .engines()
        .iter()
        .map(|engine| {
            let (tracked_pods, boosted_pods) = engine.counts();
            let mut containers = engine.containers();
            containers.sort();
            BoostStatus {
                name: engine.name().to_string(),
                namespace: engine.namespace().to_string(),
                containers,
                duration_policies: engine
                    .duration_order()
                    .iter()
                    .map(|kind| kind.to_string())
                    .collect(),
                tracked_pods,
                boosted_pods,
            }
        })
        .collect();

    Json(statuses)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/boosts", get(boosts))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
