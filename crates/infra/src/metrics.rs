//! Metrics side channel for sweep observability.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Collaborator accepting counter increments and timing observations.
///
/// Optional: processing correctness never depends on it. The sweep emits
/// `triggers.<type>.processed` counters and
/// `triggers.<type>.process_delay_seconds` timings.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, key: &str);

    fn timing(&self, key: &str, seconds: f64);
}

/// Discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr(&self, _key: &str) {}

    fn timing(&self, _key: &str, _seconds: f64) {}
}

/// Captures observations in memory; for tests and local debugging.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
    timings: Mutex<Vec<(String, f64)>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn timings_for(&self, key: &str) -> Vec<f64> {
        self.timings
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl MetricsSink for RecordingMetrics {
    fn incr(&self, key: &str) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;
    }

    fn timing(&self, key: &str, seconds: f64) {
        self.timings
            .lock()
            .unwrap()
            .push((key.to_string(), seconds));
    }
}

impl MetricsSink for Arc<RecordingMetrics> {
    fn incr(&self, key: &str) {
        (**self).incr(key)
    }

    fn timing(&self, key: &str, seconds: f64) {
        (**self).timing(key, seconds)
    }
}
