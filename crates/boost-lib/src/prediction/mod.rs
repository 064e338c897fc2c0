//! Prediction service integration
//!
//! This module provides:
//! - HTTP client for the `/cpu`, `/duration` and `/notify` endpoints
//! - Per-image cache of the last successful prediction

mod cache;
mod client;

pub use cache::PredictionCache;
pub use client::{
    CpuPrediction, DurationPrediction, NotifyRequest, PredictionClient, PredictionError,
};
