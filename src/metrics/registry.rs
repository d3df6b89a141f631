// In-memory metric sink used by the binary's HTTP surface.

use super::{Metric, MetricSink, MetricSnapshot};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Holds registered metrics under their full dotted names.
///
/// Registration happens once at startup; snapshots are taken on every request.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        metrics.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        metrics.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples every registered metric.
    pub fn snapshot(&self) -> BTreeMap<String, MetricSnapshot> {
        let metrics = self.metrics.read().unwrap_or_else(|e| e.into_inner());
        metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.snapshot()))
            .collect()
    }
}

impl MetricSink for Registry {
    fn register(&self, name: &str, metric: Metric) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        if metrics.contains_key(name) {
            tracing::warn!(metric = name, "metric already registered; keeping the first");
            return;
        }
        metrics.insert(name.to_string(), metric);
    }
}
