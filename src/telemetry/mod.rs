//! Counters and latency samples for the feed layer.
//!
//! Human-readable output goes through `tracing`; this collector keeps the
//! numbers so callers and tests can read them back without parsing logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

const MAX_LATENCY_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_invalidations: u64,
    pub fetches: u64,
    pub fetch_errors: u64,
    pub superseded_responses: u64,
    pub toggles_confirmed: u64,
    pub toggles_rolled_back: u64,
    pub duplicate_toggles: u64,
    pub count_mismatches: u64,
    pub fetch_latency_p50_ms: f64,
    pub fetch_latency_p99_ms: f64,
}

impl MetricsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_invalidations: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
    superseded_responses: AtomicU64,
    toggles_confirmed: AtomicU64,
    toggles_rolled_back: AtomicU64,
    duplicate_toggles: AtomicU64,
    count_mismatches: AtomicU64,
}

/// Thread-safe metrics collector. Clones share the same counters.
#[derive(Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
    latencies: Arc<Mutex<Vec<f64>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self, keys: u64) {
        self.counters
            .cache_invalidations
            .fetch_add(keys, Ordering::Relaxed);
    }

    pub fn record_fetch(&self, elapsed: Duration) {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut latencies) = self.latencies.lock() {
            latencies.push(elapsed.as_secs_f64() * 1000.0);
            if latencies.len() > MAX_LATENCY_SAMPLES {
                latencies.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }
    }

    pub fn record_fetch_error(&self) {
        self.counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_superseded(&self) {
        self.counters
            .superseded_responses
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_toggle_confirmed(&self) {
        self.counters.toggles_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_toggle_rolled_back(&self) {
        self.counters
            .toggles_rolled_back
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_toggle(&self) {
        self.counters.duplicate_toggles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_count_mismatch(&self) {
        self.counters.count_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (p50, p99) = match self.latencies.lock() {
            Ok(latencies) => (percentile(&latencies, 0.50), percentile(&latencies, 0.99)),
            Err(_) => (0.0, 0.0),
        };
        let c = &self.counters;

        MetricsSnapshot {
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            cache_invalidations: c.cache_invalidations.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            fetch_errors: c.fetch_errors.load(Ordering::Relaxed),
            superseded_responses: c.superseded_responses.load(Ordering::Relaxed),
            toggles_confirmed: c.toggles_confirmed.load(Ordering::Relaxed),
            toggles_rolled_back: c.toggles_rolled_back.load(Ordering::Relaxed),
            duplicate_toggles: c.duplicate_toggles.load(Ordering::Relaxed),
            count_mismatches: c.count_mismatches.load(Ordering::Relaxed),
            fetch_latency_p50_ms: p50,
            fetch_latency_p99_ms: p99,
        }
    }
}

fn percentile(samples: &[f64], q: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}
