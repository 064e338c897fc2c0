//! Agent configuration

use anyhow::{Context, Result};
use boost_lib::{BoostConfig, PredictionClientConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Agent configuration, read from `BOOST_AGENT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// JSON file listing the boosts to load
    #[serde(default = "default_boosts_file")]
    pub boosts_file: PathBuf,

    /// Timeout for a single pod update
    #[serde(default = "default_update_timeout")]
    pub update_timeout_secs: u64,

    #[serde(default = "default_prediction_timeout")]
    pub prediction_timeout_ms: u64,

    #[serde(default = "default_prediction_connect_timeout")]
    pub prediction_connect_timeout_ms: u64,

    #[serde(default = "default_prediction_max_retries")]
    pub prediction_max_retries: u32,

    #[serde(default = "default_prediction_initial_backoff")]
    pub prediction_initial_backoff_ms: u64,

    #[serde(default = "default_prediction_max_backoff")]
    pub prediction_max_backoff_ms: u64,
}

fn default_api_port() -> u16 {
    8080
}

fn default_boosts_file() -> PathBuf {
    PathBuf::from("/etc/startup-cpu-boost/boosts.json")
}

fn default_update_timeout() -> u64 {
    10
}

fn default_prediction_timeout() -> u64 {
    5_000
}

fn default_prediction_connect_timeout() -> u64 {
    2_000
}

fn default_prediction_max_retries() -> u32 {
    2
}

fn default_prediction_initial_backoff() -> u64 {
    200
}

fn default_prediction_max_backoff() -> u64 {
    2_000
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("BOOST_AGENT").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read agent configuration")?
            .try_deserialize()
            .context("invalid agent configuration")
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn prediction_config(&self) -> PredictionClientConfig {
        PredictionClientConfig {
            request_timeout: Duration::from_millis(self.prediction_timeout_ms),
            connect_timeout: Duration::from_millis(self.prediction_connect_timeout_ms),
            max_retries: self.prediction_max_retries,
            initial_backoff: Duration::from_millis(self.prediction_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.prediction_max_backoff_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BoostsFile {
    #[serde(default)]
    boosts: Vec<BoostConfig>,
}

/// Read the boosts file: `{"boosts": [<BoostConfig>, ...]}`
pub fn load_boosts(path: &Path) -> Result<Vec<BoostConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read boosts file {}", path.display()))?;
    parse_boosts(&raw).with_context(|| format!("invalid boosts file {}", path.display()))
}

pub fn parse_boosts(raw: &str) -> Result<Vec<BoostConfig>> {
    let file: BoostsFile = serde_json::from_str(raw)?;
    Ok(file.boosts)
}
