//! Boost engine
//!
//! One engine per boost. It owns the resource policy of every declared
//! container, the duration policies in evaluation order and the store of
//! tracked pods. The reconciler calls [`BoostEngine::upsert_pod`] and
//! [`BoostEngine::delete_pod`]; the engine reverts a boosted pod once one of
//! its duration policies lapses.
//!
//! Pod lifecycle inside an engine:
//!
//! ```text
//! unseen -> tracked (boosted) -> tracked (reverted) -> removed
//! unseen -> tracked (not boosted) -> removed
//! ```

mod builder;


pub use builder::BoostEngineBuilder;

use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info_span, Instrument};

use crate::annotation::{is_boosted, revert_pod, AnnotationError, BoostAnnotation};
use crate::config::{BoostConfig, ConfigError, DurationPolicyKind};
use crate::duration::DurationPolicy;
use crate::observability::{BoostLogger, BoostMetrics};
use crate::pod::{container_image, containers, pod_name, raw_cpu_of, ResourceField};
use crate::resource::ContainerPolicy;
use crate::store::{PodStore, TrackedPod};
use crate::updater::{PodUpdater, UpdateError};

/// Errors returned to the reconciler
#[derive(Debug, Error)]
pub enum BoostError {
    #[error("failed to update pod: {0}")]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error("failed to encode boost annotation: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BoostError {
    /// Whether re-driving the same pod later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BoostError::Update(e) => e.is_retryable(),
            BoostError::Annotation(_) | BoostError::Encode(_) => false,
        }
    }
}

pub struct BoostEngine {
    name: String,
    namespace: String,
    resource_policies: HashMap<String, Arc<dyn ContainerPolicy>>,
    duration_policies: HashMap<String, Arc<dyn DurationPolicy>>,
    duration_order: Vec<Arc<dyn DurationPolicy>>,
    pods: PodStore,
    updater: Arc<dyn PodUpdater>,
    logger: BoostLogger,
    metrics: BoostMetrics,
}

impl fmt::Debug for BoostEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoostEngine")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("containers", &self.resource_policies.keys())
            .field("duration_order", &self.duration_order())
            .field("tracked_pods", &self.pods.len())
            .finish()
    }
}

impl BoostEngine {
    /// Build an engine with the default prediction client settings
    pub fn new(config: &BoostConfig, updater: Arc<dyn PodUpdater>) -> Result<Self, ConfigError> {
        Self::builder(config, updater).build()
    }

    pub fn builder(config: &BoostConfig, updater: Arc<dyn PodUpdater>) -> BoostEngineBuilder<'_> {
        BoostEngineBuilder::new(config, updater)
    }

    /// Boost name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the boost applies to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resource policy declared for a container
    pub fn resource_policy(&self, container: &str) -> Option<Arc<dyn ContainerPolicy>> {
        self.resource_policies.get(container).cloned()
    }

    /// Names of the containers with a resource policy
    pub fn containers(&self) -> Vec<String> {
        self.resource_policies.keys().cloned().collect()
    }

    /// Duration policies keyed by policy name
    pub fn duration_policies(&self) -> &HashMap<String, Arc<dyn DurationPolicy>> {
        &self.duration_policies
    }

    /// Duration policy kinds in evaluation order
    pub fn duration_order(&self) -> Vec<DurationPolicyKind> {
        self.duration_order.iter().map(|p| p.kind()).collect()
    }

    /// Last observed snapshot of a tracked pod
    pub fn pod(&self, name: &str) -> Option<Pod> {
        self.pods.get(name).map(|tracked| tracked.pod)
    }

    /// Tracked entry of a pod, including its boost state
    pub fn tracked(&self, name: &str) -> Option<TrackedPod> {
        self.pods.get(name)
    }

    /// Tracked and boosted pod counts
    pub fn counts(&self) -> (usize, usize) {
        self.pods.counts()
    }

    /// Record a pod event and revert the pod if its boost has lapsed.
    ///
    /// A failed revert keeps the pod boosted so the next call retries it.
    pub async fn upsert_pod(&self, pod: &Pod) -> Result<(), BoostError> {
        let span = info_span!(
            "upsert_pod",
            boost = %self.name,
            namespace = %self.namespace,
            pod_name = %pod_name(pod)
        );
        let result = self.reconcile(pod).instrument(span).await;
        self.publish_counts();
        result
    }

    /// Stop tracking a pod. Deleting an unknown pod is a no-op.
    /// Returns whether the pod was tracked; never fails today.
    pub fn delete_pod(&self, pod: &Pod) -> Result<bool, BoostError> {
        let name = pod_name(pod);
        let was_tracked = self.pods.remove(name).is_some();
        self.logger.log_pod_removed(name, was_tracked);
        self.publish_counts();
        Ok(was_tracked)
    }

    /// Boosted copy of a pod for admission, or `None` when no container changes.
    ///
    /// Applies each declared container's resource policy and records the
    /// replaced values in the boost annotation. Nothing is persisted.
    pub async fn boost_pod(&self, pod: &Pod) -> Result<Option<Pod>, BoostError> {
        if is_boosted(pod) {
            return Ok(None);
        }

        let mut boosted = pod.clone();
        let mut annotation = BoostAnnotation::new(Utc::now());

        if let Some(spec) = boosted.spec.as_mut() {
            for container in spec.containers.iter_mut() {
                let Some(policy) = self.resource_policies.get(&container.name) else {
                    continue;
                };
                let Some(resources) = policy.new_resources(container).await else {
                    continue;
                };

                let current = container.resources.clone().unwrap_or_default();
                let mut changed = false;
                for field in [ResourceField::Requests, ResourceField::Limits] {
                    let before = raw_cpu_of(&current, field);
                    if before != raw_cpu_of(&resources, field) {
                        if let Some(original) = before {
                            annotation.record(&container.name, field, original);
                        }
                        changed = true;
                    }
                }
                if changed {
                    container.resources = Some(resources);
                }
            }
        }

        if annotation.is_empty() {
            return Ok(None);
        }
        annotation.apply_to(&mut boosted, &self.name)?;
        Ok(Some(boosted))
    }

    async fn reconcile(&self, pod: &Pod) -> Result<(), BoostError> {
        let name = pod_name(pod);

        let Some(tracked) = self.pods.get(name) else {
            let boosted = is_boosted(pod);
            self.pods.insert(TrackedPod::new(pod.clone(), boosted));
            self.logger.log_pod_tracked(name, boosted);
            return Ok(());
        };

        if !tracked.boosted {
            self.pods.refresh(pod.clone());
            return Ok(());
        }

        if !is_boosted(pod) {
            self.logger.log_reverted_externally(name);
            self.pods.mark_unboosted(pod.clone());
            return Ok(());
        }

        let Some(lapsed) = self.lapsed_policy(pod).await else {
            self.pods.refresh(pod.clone());
            return Ok(());
        };

        if !self.pods.begin_revert(name) {
            self.logger.log_revert_in_progress(name);
            self.pods.refresh(pod.clone());
            return Ok(());
        }
        self.logger.log_boost_expired(name, lapsed.as_str());

        let result = self.revert(pod).await;
        self.pods.finish_revert(pod.clone(), result.is_ok());
        match result {
            Ok(containers) => {
                self.metrics.inc_reverts(&self.namespace, &self.name);
                self.logger.log_reverted(name, containers);
                Ok(())
            }
            Err(e) => {
                let retryable = e.is_retryable();
                self.metrics
                    .inc_revert_failures(&self.namespace, &self.name, retryable);
                self.logger.log_revert_failed(name, &e, retryable);
                Err(e)
            }
        }
    }

    /// First duration policy, in evaluation order, that no longer holds
    async fn lapsed_policy(&self, pod: &Pod) -> Option<DurationPolicyKind> {
        for policy in &self.duration_order {
            if !policy.is_valid(pod).await {
                return Some(policy.kind());
            }
        }
        None
    }

    /// Persist the reverted pod and notify every policy involved.
    /// Returns the number of restored containers.
    async fn revert(&self, pod: &Pod) -> Result<usize, BoostError> {
        let reverted = revert_pod(pod)?;
        self.updater.update(&reverted.pod).await?;

        for policy in &self.duration_order {
            if let Err(e) = policy.on_reverted(pod).await {
                self.logger
                    .log_policy_error(pod_name(pod), policy.kind().as_str(), &e);
            }
        }

        for container in containers(pod) {
            if !reverted.containers.contains(&container.name) {
                continue;
            }
            if let Some(policy) = self.resource_policies.get(&container.name) {
                policy.on_reverted(container_image(container));
            }
        }

        Ok(reverted.containers.len())
    }

    fn publish_counts(&self) {
        let (tracked, boosted) = self.pods.counts();
        self.metrics
            .set_pod_counts(&self.namespace, &self.name, tracked, boosted);
    }
}
