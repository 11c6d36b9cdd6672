//! Worker metrics collection.
//!
//! Tracks labeled counters (fetch successes/failures, alerts emitted,
//! job failures) and duration statistics per symbol, exposed as a
//! JSON-serializable snapshot. Increments are infallible and never
//! consulted by job logic; dropping the collector changes nothing
//! about job outcomes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Metric names, mirroring the wire names of the original exporter.
pub mod names {
    pub const FETCH_SUCCESS: &str = "fetch_price_success_total";
    pub const FETCH_FAILURE: &str = "fetch_price_failure_total";
    pub const FETCH_DURATION: &str = "fetch_price_duration_seconds";
    pub const ALERTS_TOTAL: &str = "alerts_total";
    pub const ALERT_COMPUTE: &str = "alert_compute_seconds";
    pub const JOB_FAILURE: &str = "job_failure_total";
}

// ── Duration stats ────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct DurationStats {
    count: u64,
    total_secs: f64,
    max_secs: f64,
}

/// JSON-serializable duration summary.
#[derive(Debug, Clone, Serialize)]
pub struct DurationSnapshot {
    pub count: u64,
    pub total_secs: f64,
    pub mean_secs: f64,
    pub max_secs: f64,
}

// ── Snapshot ──────────────────────────────────────────────────

/// Point-in-time view of all recorded metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// metric name → label → count.
    pub counters: BTreeMap<String, BTreeMap<String, u64>>,
    /// metric name → label → duration summary.
    pub durations: BTreeMap<String, BTreeMap<String, DurationSnapshot>>,
    pub uptime_secs: f64,
}

// ── Collector ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inner {
    counters: BTreeMap<String, BTreeMap<String, u64>>,
    durations: BTreeMap<String, BTreeMap<String, DurationStats>>,
}

/// Thread-safe metrics collector shared across jobs.
///
/// Cloning is cheap; all clones record into the same state.
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    inner: Arc<Mutex<Inner>>,
    start: Instant,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            start: Instant::now(),
        }
    }

    /// Increment a labeled counter by one.
    pub fn incr(&self, metric: &str, label: &str) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        *inner
            .counters
            .entry(metric.to_string())
            .or_default()
            .entry(label.to_string())
            .or_insert(0) += 1;
    }

    /// Record one observation of a labeled duration.
    pub fn observe(&self, metric: &str, label: &str, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        let stats = inner
            .durations
            .entry(metric.to_string())
            .or_default()
            .entry(label.to_string())
            .or_default();
        stats.count += 1;
        stats.total_secs += secs;
        if secs > stats.max_secs {
            stats.max_secs = secs;
        }
    }

    /// Current value of a labeled counter (0 if never incremented).
    pub fn counter(&self, metric: &str, label: &str) -> u64 {
        let inner = self.inner.lock().expect("metrics mutex poisoned");
        inner
            .counters
            .get(metric)
            .and_then(|labels| labels.get(label))
            .copied()
            .unwrap_or(0)
    }

    /// Number of observations recorded for a labeled duration.
    pub fn observation_count(&self, metric: &str, label: &str) -> u64 {
        let inner = self.inner.lock().expect("metrics mutex poisoned");
        inner
            .durations
            .get(metric)
            .and_then(|labels| labels.get(label))
            .map(|s| s.count)
            .unwrap_or(0)
    }

    /// Build a complete snapshot for the metrics endpoint.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("metrics mutex poisoned");

        let durations = inner
            .durations
            .iter()
            .map(|(metric, labels)| {
                let labels = labels
                    .iter()
                    .map(|(label, stats)| {
                        (
                            label.clone(),
                            DurationSnapshot {
                                count: stats.count,
                                total_secs: stats.total_secs,
                                mean_secs: if stats.count > 0 {
                                    stats.total_secs / stats.count as f64
                                } else {
                                    0.0
                                },
                                max_secs: stats.max_secs,
                            },
                        )
                    })
                    .collect();
                (metric.clone(), labels)
            })
            .collect();

        MetricsSnapshot {
            counters: inner.counters.clone(),
            durations,
            uptime_secs: self.start.elapsed().as_secs_f64(),
        }
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label() {
        let metrics = WorkerMetrics::new();
        metrics.incr(names::FETCH_SUCCESS, "BTC");
        metrics.incr(names::FETCH_SUCCESS, "BTC");
        metrics.incr(names::FETCH_SUCCESS, "ETH");

        assert_eq!(metrics.counter(names::FETCH_SUCCESS, "BTC"), 2);
        assert_eq!(metrics.counter(names::FETCH_SUCCESS, "ETH"), 1);
        assert_eq!(metrics.counter(names::FETCH_SUCCESS, "SOL"), 0);
        assert_eq!(metrics.counter(names::FETCH_FAILURE, "BTC"), 0);
    }

    #[test]
    fn durations_track_count_mean_max() {
        let metrics = WorkerMetrics::new();
        metrics.observe(names::FETCH_DURATION, "BTC", Duration::from_millis(100));
        metrics.observe(names::FETCH_DURATION, "BTC", Duration::from_millis(300));

        let snap = metrics.snapshot();
        let stats = &snap.durations[names::FETCH_DURATION]["BTC"];
        assert_eq!(stats.count, 2);
        assert!((stats.mean_secs - 0.2).abs() < 1e-9);
        assert!((stats.max_secs - 0.3).abs() < 1e-9);
    }

    #[test]
    fn clones_share_state() {
        let metrics = WorkerMetrics::new();
        let clone = metrics.clone();
        clone.incr(names::ALERTS_TOTAL, "BTC");
        assert_eq!(metrics.counter(names::ALERTS_TOTAL, "BTC"), 1);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let metrics = WorkerMetrics::new();
        metrics.incr(names::JOB_FAILURE, "fetch_BTC");
        metrics.observe(names::ALERT_COMPUTE, "BTC", Duration::from_millis(5));

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["counters"][names::JOB_FAILURE]["fetch_BTC"], 1);
        assert_eq!(json["durations"][names::ALERT_COMPUTE]["BTC"]["count"], 1);
    }
}
