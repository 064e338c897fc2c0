//! Observability infrastructure for the boost engine
//!
//! Provides:
//! - Prometheus metrics (tracked pods, reversions, prediction calls)
//! - A structured logger carrying the boost identity, handed to every policy

use prometheus::{register_int_counter_vec, register_int_gauge_vec, IntCounterVec, IntGaugeVec};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::units::format_duration;

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<BoostMetricsInner> = OnceLock::new();

struct BoostMetricsInner {
    tracked_pods: IntGaugeVec,
    boosted_pods: IntGaugeVec,
    reverts: IntCounterVec,
    revert_failures: IntCounterVec,
    prediction_requests: IntCounterVec,
    prediction_cache_hits: IntCounterVec,
}

impl BoostMetricsInner {
    fn new() -> Self {
        Self {
            tracked_pods: register_int_gauge_vec!(
                "startup_cpu_boost_tracked_pods",
                "Number of pods tracked by a boost",
                &["namespace", "boost"]
            )
            .expect("Failed to register tracked_pods"),

            boosted_pods: register_int_gauge_vec!(
                "startup_cpu_boost_boosted_pods",
                "Number of tracked pods still running with boosted resources",
                &["namespace", "boost"]
            )
            .expect("Failed to register boosted_pods"),

            reverts: register_int_counter_vec!(
                "startup_cpu_boost_reverts_total",
                "Total number of pods reverted to their original resources",
                &["namespace", "boost"]
            )
            .expect("Failed to register reverts"),

            revert_failures: register_int_counter_vec!(
                "startup_cpu_boost_revert_failures_total",
                "Total number of failed reversion attempts",
                &["namespace", "boost", "retryable"]
            )
            .expect("Failed to register revert_failures"),

            prediction_requests: register_int_counter_vec!(
                "startup_cpu_boost_prediction_requests_total",
                "Total number of calls to the prediction service",
                &["kind", "outcome"]
            )
            .expect("Failed to register prediction_requests"),

            prediction_cache_hits: register_int_counter_vec!(
                "startup_cpu_boost_prediction_cache_hits_total",
                "Total number of predictions served from the per-image cache",
                &["kind"]
            )
            .expect("Failed to register prediction_cache_hits"),
        }
    }
}

/// Boost metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Debug, Clone)]
pub struct BoostMetrics {
    _private: (),
}

impl Default for BoostMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BoostMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(BoostMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &BoostMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn set_pod_counts(&self, namespace: &str, boost: &str, tracked: usize, boosted: usize) {
        self.inner()
            .tracked_pods
            .with_label_values(&[namespace, boost])
            .set(tracked as i64);
        self.inner()
            .boosted_pods
            .with_label_values(&[namespace, boost])
            .set(boosted as i64);
    }

    pub fn inc_reverts(&self, namespace: &str, boost: &str) {
        self.inner()
            .reverts
            .with_label_values(&[namespace, boost])
            .inc();
    }

    pub fn inc_revert_failures(&self, namespace: &str, boost: &str, retryable: bool) {
        let retryable = if retryable { "true" } else { "false" };
        self.inner()
            .revert_failures
            .with_label_values(&[namespace, boost, retryable])
            .inc();
    }

    pub fn inc_prediction_requests(&self, kind: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.inner()
            .prediction_requests
            .with_label_values(&[kind, outcome])
            .inc();
    }

    pub fn inc_prediction_cache_hits(&self, kind: &str) {
        self.inner()
            .prediction_cache_hits
            .with_label_values(&[kind])
            .inc();
    }
}

/// Structured logger for boost events
///
/// Each engine owns one and hands a clone to every policy it builds, so all
/// events carry the boost they belong to.
#[derive(Debug, Clone)]
pub struct BoostLogger {
    boost: String,
    namespace: String,
    component: &'static str,
}

impl BoostLogger {
    pub fn new(boost: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            boost: boost.into(),
            namespace: namespace.into(),
            component: "engine",
        }
    }

    /// Logger for a named component of the same boost
    pub fn component(&self, component: &'static str) -> Self {
        Self {
            component,
            ..self.clone()
        }
    }

    pub fn boost(&self) -> &str {
        &self.boost
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn log_pod_tracked(&self, pod_name: &str, boosted: bool) {
        info!(
            event = "pod_tracked",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            boosted = boosted,
            "Tracking pod"
        );
    }

    pub fn log_pod_removed(&self, pod_name: &str, was_tracked: bool) {
        debug!(
            event = "pod_removed",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            was_tracked = was_tracked,
            "Stopped tracking pod"
        );
    }

    pub fn log_boost_expired(&self, pod_name: &str, policy: &str) {
        info!(
            event = "boost_expired",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            policy = %policy,
            "Boost duration policy no longer valid"
        );
    }

    pub fn log_reverted(&self, pod_name: &str, containers: usize) {
        info!(
            event = "boost_reverted",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            containers = containers,
            "Reverted pod to original CPU resources"
        );
    }

    pub fn log_revert_failed(&self, pod_name: &str, error: &dyn std::error::Error, retryable: bool) {
        warn!(
            event = "boost_revert_failed",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            error = %error,
            retryable = retryable,
            "Failed to revert pod, keeping it boosted"
        );
    }

    pub fn log_revert_in_progress(&self, pod_name: &str) {
        debug!(
            event = "revert_in_progress",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            "Revert already in progress, skipping"
        );
    }

    pub fn log_reverted_externally(&self, pod_name: &str) {
        info!(
            event = "boost_reverted_externally",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            "Pod no longer carries boost annotation"
        );
    }

    pub fn log_resource_kept(&self, container: &str, field: &str, current: &str, candidate: &str) {
        debug!(
            event = "resource_kept",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            container = %container,
            field = %field,
            current = %current,
            candidate = %candidate,
            "Container already has higher CPU than policy"
        );
    }

    pub fn log_invalid_current(&self, container: &str, field: &str, error: &dyn std::error::Error) {
        warn!(
            event = "invalid_current_resource",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            container = %container,
            field = %field,
            error = %error,
            "Container CPU value cannot be parsed, leaving it unchanged"
        );
    }

    pub fn log_prediction_failed(&self, image: &str, error: &dyn std::error::Error) {
        warn!(
            event = "prediction_failed",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            image = %image,
            error = %error,
            "Failed to get prediction"
        );
    }

    pub fn log_predicted_duration(&self, image: &str, duration: Duration, cached: bool) {
        debug!(
            event = "duration_predicted",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            image = %image,
            duration = %format_duration(duration),
            cached = cached,
            "Resolved boost duration"
        );
    }

    pub fn log_notify_failed(&self, pod_name: &str, error: &dyn std::error::Error) {
        warn!(
            event = "notify_failed",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            error = %error,
            "Failed to notify prediction service about reversion"
        );
    }

    pub fn log_policy_error(&self, pod_name: &str, policy: &str, error: &dyn std::error::Error) {
        warn!(
            event = "policy_error",
            boost = %self.boost,
            namespace = %self.namespace,
            component = self.component,
            pod_name = %pod_name,
            policy = %policy,
            error = %error,
            "Duration policy failed"
        );
    }
}
