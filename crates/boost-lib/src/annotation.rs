//! Boost bookkeeping stored on the pod itself
//!
//! A boosted pod carries a label naming its boost and an annotation recording
//! the CPU values each container had before the boost. Reversion restores
//! those values and removes both markers.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::pod::{pod_name, set_cpu, ResourceField};

pub const BOOST_LABEL_KEY: &str = "autoscaling.x-k8s.io/startup-cpu-boost";
pub const BOOST_ANNOTATION_KEY: &str = "autoscaling.x-k8s.io/startup-cpu-boost";

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("pod {pod:?} has no boost annotation")]
    Missing { pod: String },

    #[error("pod {pod:?} has a malformed boost annotation: {source}")]
    Malformed {
        pod: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Original CPU values recorded when the boost was applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostAnnotation {
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub boost_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "initCPURequests", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub init_cpu_requests: BTreeMap<String, String>,
    #[serde(rename = "initCPULimits", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub init_cpu_limits: BTreeMap<String, String>,
}

impl BoostAnnotation {
    pub fn new(boost_timestamp: DateTime<Utc>) -> Self {
        Self {
            boost_timestamp: Some(boost_timestamp),
            ..Default::default()
        }
    }

    /// Read the annotation from a pod; `Ok(None)` when the pod is not boosted
    pub fn from_pod(pod: &Pod) -> Result<Option<Self>, AnnotationError> {
        let Some(raw) = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(BOOST_ANNOTATION_KEY))
        else {
            return Ok(None);
        };

        serde_json::from_str(raw)
            .map(Some)
            .map_err(|source| AnnotationError::Malformed {
                pod: pod_name(pod).to_string(),
                source,
            })
    }

    pub fn record(&mut self, container: &str, field: ResourceField, original: &Quantity) {
        let map = match field {
            ResourceField::Requests => &mut self.init_cpu_requests,
            ResourceField::Limits => &mut self.init_cpu_limits,
        };
        map.insert(container.to_string(), original.0.clone());
    }

    pub fn original(&self, container: &str, field: ResourceField) -> Option<&str> {
        let map = match field {
            ResourceField::Requests => &self.init_cpu_requests,
            ResourceField::Limits => &self.init_cpu_limits,
        };
        map.get(container).map(String::as_str)
    }

    /// Names of containers with at least one recorded original value
    pub fn containers(&self) -> BTreeSet<&str> {
        self.init_cpu_requests
            .keys()
            .chain(self.init_cpu_limits.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.init_cpu_requests.is_empty() && self.init_cpu_limits.is_empty()
    }

    /// Write the annotation and the boost label onto a pod
    pub fn apply_to(&self, pod: &mut Pod, boost_name: &str) -> Result<(), serde_json::Error> {
        let raw = serde_json::to_string(self)?;
        pod.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(BOOST_ANNOTATION_KEY.to_string(), raw);
        pod.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(BOOST_LABEL_KEY.to_string(), boost_name.to_string());
        Ok(())
    }
}

/// True when the pod still carries the boost annotation
pub fn is_boosted(pod: &Pod) -> bool {
    pod.metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(BOOST_ANNOTATION_KEY))
}

/// Name of the boost a pod was boosted by, from its label
pub fn boost_name(pod: &Pod) -> Option<&str> {
    pod.metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(BOOST_LABEL_KEY))
        .map(String::as_str)
}

/// A pod with its original CPU values restored
#[derive(Debug, Clone)]
pub struct RevertedPod {
    pub pod: Pod,
    /// Containers whose resources were restored
    pub containers: Vec<String>,
}

/// Restore the pre-boost CPU values recorded in the annotation and drop the
/// boost label and annotation. Containers named in the annotation but missing
/// from the pod are skipped.
pub fn revert_pod(pod: &Pod) -> Result<RevertedPod, AnnotationError> {
    let annotation = BoostAnnotation::from_pod(pod)?.ok_or_else(|| AnnotationError::Missing {
        pod: pod_name(pod).to_string(),
    })?;

    let mut reverted = pod.clone();
    let mut restored = Vec::new();

    if let Some(spec) = reverted.spec.as_mut() {
        for container in spec.containers.iter_mut() {
            let mut touched = false;
            for field in [ResourceField::Requests, ResourceField::Limits] {
                if let Some(original) = annotation.original(&container.name, field) {
                    let resources = container.resources.get_or_insert_with(Default::default);
                    set_cpu(resources, field, Quantity(original.to_string()));
                    touched = true;
                }
            }
            if touched {
                restored.push(container.name.clone());
            }
        }
    }

    if let Some(annotations) = reverted.metadata.annotations.as_mut() {
        annotations.remove(BOOST_ANNOTATION_KEY);
    }
    if let Some(labels) = reverted.metadata.labels.as_mut() {
        labels.remove(BOOST_LABEL_KEY);
    }

    Ok(RevertedPod {
        pod: reverted,
        containers: restored,
    })
}
