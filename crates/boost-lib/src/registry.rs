//! Registry of boost engines
//!
//! Engines are keyed by `namespace/name` of their boost. A boosted pod is
//! routed to its engine through the boost label it carries.

use dashmap::DashMap;
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;

use crate::annotation::boost_name;
use crate::engine::BoostEngine;
use crate::pod::pod_namespace;

#[derive(Debug, Default)]
pub struct BoostRegistry {
    engines: DashMap<String, Arc<BoostEngine>>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl BoostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine, replacing any engine for the same boost
    pub fn insert(&self, engine: Arc<BoostEngine>) -> Option<Arc<BoostEngine>> {
        self.engines
            .insert(key(engine.namespace(), engine.name()), engine)
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<BoostEngine>> {
        self.engines
            .get(&key(namespace, name))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, namespace: &str, name: &str) -> Option<Arc<BoostEngine>> {
        self.engines
            .remove(&key(namespace, name))
            .map(|(_, engine)| engine)
    }

    /// Engine of the boost named by the pod's boost label, in the pod's namespace
    pub fn for_pod(&self, pod: &Pod) -> Option<Arc<BoostEngine>> {
        let name = boost_name(pod)?;
        self.get(pod_namespace(pod), name)
    }

    /// All engines, ordered by namespace and name
    pub fn engines(&self) -> Vec<Arc<BoostEngine>> {
        let mut engines: Vec<_> = self
            .engines
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        engines.sort_by(|a, b| {
            (a.namespace(), a.name()).cmp(&(b.namespace(), b.name()))
        });
        engines
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
