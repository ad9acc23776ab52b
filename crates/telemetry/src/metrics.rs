//! In-process metrics for archival runs.
//!
//! Counters accumulate across runs of the same process; a snapshot is
//! logged at the end of every run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the archival job.
#[derive(Debug, Default)]
pub struct Metrics {
    // Run outcomes
    pub runs_started: Counter,
    pub runs_completed: Counter,
    pub runs_noop: Counter,
    pub runs_failed: Counter,
    pub runs_eviction_incomplete: Counter,

    // Pipeline volume
    pub users_selected: Counter,
    pub records_fetched: Counter,
    pub records_archived: Counter,
    pub records_unconfirmed: Counter,
    pub records_evicted: Counter,

    // Errors
    pub eviction_errors: Counter,
    pub report_errors: Counter,

    // Outbox relay
    pub relay_rows_published: Counter,
    pub relay_rows_marked: Counter,
    pub relay_errors: Counter,

    // Latency histograms
    pub select_latency_ms: Histogram,
    pub fetch_latency_ms: Histogram,
    pub archive_latency_ms: Histogram,
    pub evict_latency_ms: Histogram,
    pub run_latency_ms: Histogram,

    // Gauges
    /// Records archived but still live after the last run
    pub duplicated_records: Gauge,
    /// Unix seconds of the last run that ended completed or no-op
    pub last_success_epoch_secs: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_noop: u64,
    pub runs_failed: u64,
    pub runs_eviction_incomplete: u64,
    pub users_selected: u64,
    pub records_fetched: u64,
    pub records_archived: u64,
    pub records_unconfirmed: u64,
    pub records_evicted: u64,
    pub eviction_errors: u64,
    pub report_errors: u64,
    pub relay_rows_published: u64,
    pub relay_rows_marked: u64,
    pub relay_errors: u64,
    pub select_latency_mean_ms: f64,
    pub archive_latency_mean_ms: f64,
    pub run_latency_mean_ms: f64,
    pub duplicated_records: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            runs_started: self.runs_started.get(),
            runs_completed: self.runs_completed.get(),
            runs_noop: self.runs_noop.get(),
            runs_failed: self.runs_failed.get(),
            runs_eviction_incomplete: self.runs_eviction_incomplete.get(),
            users_selected: self.users_selected.get(),
            records_fetched: self.records_fetched.get(),
            records_archived: self.records_archived.get(),
            records_unconfirmed: self.records_unconfirmed.get(),
            records_evicted: self.records_evicted.get(),
            eviction_errors: self.eviction_errors.get(),
            report_errors: self.report_errors.get(),
            relay_rows_published: self.relay_rows_published.get(),
            relay_rows_marked: self.relay_rows_marked.get(),
            relay_errors: self.relay_errors.get(),
            select_latency_mean_ms: self.select_latency_ms.mean(),
            archive_latency_mean_ms: self.archive_latency_ms.mean(),
            run_latency_mean_ms: self.run_latency_ms.mean(),
            duplicated_records: self.duplicated_records.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
