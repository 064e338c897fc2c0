//! Per-image prediction cache
//!
//! Entries live until they are explicitly removed on reversion; there is no
//! time-based expiry. Two callers missing the same key at once may both call
//! the prediction service; the later insert wins.

use dashmap::DashMap;

#[derive(Debug)]
pub struct PredictionCache<V> {
    entries: DashMap<String, V>,
}

impl<V: Clone> PredictionCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, image: &str) -> Option<V> {
        self.entries.get(image).map(|entry| entry.value().clone())
    }

    /// Insert or replace the prediction for an image.
    /// Returns false without storing anything when the image name is empty.
    pub fn insert(&self, image: &str, value: V) -> bool {
        if image.is_empty() {
            return false;
        }
        self.entries.insert(image.to_string(), value);
        true
    }

    pub fn remove(&self, image: &str) -> Option<V> {
        self.entries.remove(image).map(|(_, v)| v)
    }

    pub fn contains(&self, image: &str) -> bool {
        self.entries.contains_key(image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for PredictionCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
