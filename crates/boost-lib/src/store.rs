//! Concurrent store of the pods an engine tracks

use dashmap::DashMap;
use k8s_openapi::api::core::v1::Pod;

use crate::pod::{pod_name, pod_namespace};

/// Last observed snapshot of a pod and whether it still runs boosted
#[derive(Debug, Clone)]
pub struct TrackedPod {
    /// Pod as of the latest event
    pub pod: Pod,
    /// Namespace of the pod
    pub namespace: String,
    /// True while at least one container still runs with boosted resources
    pub boosted: bool,
    /// True while a caller holds the claim to revert this pod
    pub reverting: bool,
}

impl TrackedPod {
    /// Track a pod that is not being reverted
    pub fn new(pod: Pod, boosted: bool) -> Self {
        Self {
            namespace: pod_namespace(&pod).to_string(),
            pod,
            boosted,
            reverting: false,
        }
    }

    /// Name of the tracked pod
    pub fn name(&self) -> &str {
        pod_name(&self.pod)
    }
}

/// Tracked pods keyed by pod name.
///
/// Every method holds the shard lock only for the map access itself; callers
/// never await while holding an entry. State changes that race with a revert
/// in flight go through [`PodStore::begin_revert`] and
/// [`PodStore::finish_revert`].
#[derive(Debug, Default)]
pub struct PodStore {
    pods: DashMap<String, TrackedPod>,
}

impl PodStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the tracked entry for a pod
    pub fn get(&self, name: &str) -> Option<TrackedPod> {
        self.pods.get(name).map(|entry| entry.value().clone())
    }

    /// Insert or replace; returns the previous entry
    pub fn insert(&self, tracked: TrackedPod) -> Option<TrackedPod> {
        self.pods.insert(tracked.name().to_string(), tracked)
    }

    /// Replace the snapshot of a tracked pod, keeping its boost state.
    /// Returns false when the pod is no longer tracked.
    pub fn refresh(&self, pod: Pod) -> bool {
        self.update(pod, |_| {})
    }

    /// Replace the snapshot and record that the pod no longer runs boosted
    pub fn mark_unboosted(&self, pod: Pod) -> bool {
        self.update(pod, |entry| entry.boosted = false)
    }

    /// Claim the revert of a boosted pod.
    ///
    /// Returns true for exactly one caller until the claim is released with
    /// [`PodStore::finish_revert`]; false when the pod is unknown, no longer
    /// boosted or already being reverted.
    pub fn begin_revert(&self, name: &str) -> bool {
        match self.pods.get_mut(name) {
            Some(mut entry) if entry.boosted && !entry.reverting => {
                entry.reverting = true;
                true
            }
            _ => false,
        }
    }

    /// Release a revert claim and store the latest snapshot.
    /// A successful revert clears the boosted flag; a failed one leaves it as is.
    pub fn finish_revert(&self, pod: Pod, reverted: bool) -> bool {
        self.update(pod, |entry| {
            entry.reverting = false;
            if reverted {
                entry.boosted = false;
            }
        })
    }

    fn update<F>(&self, pod: Pod, apply: F) -> bool
    where
        F: FnOnce(&mut TrackedPod),
    {
        match self.pods.get_mut(pod_name(&pod)) {
            Some(mut entry) => {
                entry.namespace = pod_namespace(&pod).to_string();
                entry.pod = pod;
                apply(&mut entry);
                true
            }
            None => false,
        }
    }

    /// Stop tracking a pod; returns the removed entry
    pub fn remove(&self, name: &str) -> Option<TrackedPod> {
        self.pods.remove(name).map(|(_, tracked)| tracked)
    }

    /// Whether the pod is tracked
    pub fn contains(&self, name: &str) -> bool {
        self.pods.contains_key(name)
    }

    /// Number of tracked pods
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    /// Whether no pod is tracked
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Number of tracked pods and how many of them are boosted
    pub fn counts(&self) -> (usize, usize) {
        let boosted = self.pods.iter().filter(|entry| entry.boosted).count();
        (self.pods.len(), boosted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::fixtures::{container, pod};
    use std::sync::Arc;

    fn tracked(name: &str, boosted: bool) -> TrackedPod {
        TrackedPod::new(pod(name, vec![container("app", "nginx", None, None)]), boosted)
    }

    #[test]
    fn test_insert_replace_remove() {
        let store = PodStore::new();
        assert!(store.insert(tracked("web-0", true)).is_none());

        let previous = store.insert(tracked("web-0", false)).unwrap();
        assert!(previous.boosted);
        assert!(!store.get("web-0").unwrap().boosted);
        assert_eq!(store.get("web-0").unwrap().namespace, "demo");

        assert!(store.remove("web-0").is_some());
        assert!(store.remove("web-0").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_refresh_skips_removed_pods() {
        let store = PodStore::new();
        let p = tracked("web-0", true).pod;
        assert!(!store.refresh(p.clone()));
        assert!(!store.mark_unboosted(p.clone()));
        assert!(!store.contains("web-0"));

        store.insert(tracked("web-0", true));
        assert!(store.refresh(p.clone()));
        assert!(store.get("web-0").unwrap().boosted);
        assert!(store.mark_unboosted(p));
        assert!(!store.get("web-0").unwrap().boosted);
    }

    #[test]
    fn test_revert_claim_is_exclusive() {
        let store = PodStore::new();
        let p = tracked("web-0", true).pod;
        assert!(!store.begin_revert("web-0"));

        store.insert(tracked("web-0", true));
        assert!(store.begin_revert("web-0"));
        assert!(!store.begin_revert("web-0"));
        assert!(store.get("web-0").unwrap().reverting);

        // A failed revert releases the claim and keeps the pod boosted
        assert!(store.finish_revert(p.clone(), false));
        let entry = store.get("web-0").unwrap();
        assert!(entry.boosted);
        assert!(!entry.reverting);

        assert!(store.begin_revert("web-0"));
        assert!(store.finish_revert(p, true));
        let entry = store.get("web-0").unwrap();
        assert!(!entry.boosted);
        assert!(!entry.reverting);
        assert!(!store.begin_revert("web-0"));
    }

    #[test]
    fn test_failed_revert_keeps_external_unboost() {
        let store = PodStore::new();
        let p = tracked("web-0", true).pod;
        store.insert(tracked("web-0", true));

        assert!(store.begin_revert("web-0"));
        store.mark_unboosted(p.clone());
        store.finish_revert(p, false);

        assert!(!store.get("web-0").unwrap().boosted);
    }

    #[test]
    fn test_counts() {
        let store = PodStore::new();
        store.insert(tracked("web-0", true));
        store.insert(tracked("web-1", false));
        store.insert(tracked("web-2", true));

        assert_eq!(store.counts(), (3, 2));
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(PodStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let name = format!("web-{}-{}", i, j);
                        store.insert(tracked(&name, j % 2 == 0));
                        if j % 5 == 0 {
                            store.remove(&name);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8 * 40);
    }
}
