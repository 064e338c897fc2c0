//! Startup CPU boost agent
//!
//! Loads the configured boosts, builds one engine per boost and serves
//! health, metrics and boost status. Watching pods and admitting new ones are
//! out of scope for this binary; engines only see events passed to
//! `upsert_pod` and `delete_pod` by a caller.

use anyhow::{Context, Result};
use boost_lib::{
    health::components, BoostEngine, BoostMetrics, BoostRegistry, HealthRegistry,
    KubePodUpdater, PodUpdater,
};
use boost_agent::{api, config};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = AGENT_VERSION, "Starting boost-agent");

    let config = config::AgentConfig::load()?;
    let boost_configs = config::load_boosts(&config.boosts_file)?;
    info!(
        boosts_file = %config.boosts_file.display(),
        boosts = boost_configs.len(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    health_registry.set_healthy(components::KUBERNETES).await;

    let updater: Arc<dyn PodUpdater> =
        Arc::new(KubePodUpdater::new(client, config.update_timeout()));
    let metrics = BoostMetrics::new();
    let registry = Arc::new(BoostRegistry::new());

    let mut failed = 0;
    for boost in &boost_configs {
        let engine = BoostEngine::builder(boost, Arc::clone(&updater))
            .prediction_config(config.prediction_config())
            .metrics(metrics.clone())
            .build();
        match engine {
            Ok(engine) => {
                info!(boost = %boost.name, namespace = %boost.namespace, "Boost loaded");
                registry.insert(Arc::new(engine));
            }
            Err(e) => {
                failed += 1;
                error!(boost = %boost.name, namespace = %boost.namespace, error = %e, "Invalid boost configuration");
            }
        }
    }

    if failed > 0 {
        health_registry
            .set_degraded(
                components::ENGINES,
                format!("{} of {} boosts failed to load", failed, boost_configs.len()),
            )
            .await;
    } else {
        health_registry.set_healthy(components::ENGINES).await;
    }
    health_registry.set_ready(true).await;

    let app_state = Arc::new(api::AppState::new(health_registry, Arc::clone(&registry)));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => warn!("API server stopped"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
