//! # Metrics Collection
//!
//! Lightweight in-process counters for proxied-request outcomes, reported
//! periodically via structured logging: request volume, the
//! success/rejection/failure split, and average upstream latency.

use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub rate_limited_requests: u64,
    pub upstream_failures: u64,
    pub no_backend_failures: u64,
    pub avg_upstream_latency_ms: f64,
    pub requests_per_second: f64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    request_counter: Arc<AtomicU64>,
    success_counter: Arc<AtomicU64>,
    rate_limited_counter: Arc<AtomicU64>,
    upstream_failure_counter: Arc<AtomicU64>,
    no_backend_counter: Arc<AtomicU64>,
    latency_accumulator_ms: Arc<AtomicU64>,
    latency_count: Arc<AtomicUsize>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            request_counter: Arc::new(AtomicU64::new(0)),
            success_counter: Arc::new(AtomicU64::new(0)),
            rate_limited_counter: Arc::new(AtomicU64::new(0)),
            upstream_failure_counter: Arc::new(AtomicU64::new(0)),
            no_backend_counter: Arc::new(AtomicU64::new(0)),
            latency_accumulator_ms: Arc::new(AtomicU64::new(0)),
            latency_count: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.request_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.success_counter.fetch_add(1, Ordering::Relaxed);
        self.latency_accumulator_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failure_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_backend(&self) {
        self.no_backend_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProxyMetrics {
        let total_requests = self.request_counter.load(Ordering::Relaxed);
        let successful_requests = self.success_counter.load(Ordering::Relaxed);
        let rate_limited_requests = self.rate_limited_counter.load(Ordering::Relaxed);
        let upstream_failures = self.upstream_failure_counter.load(Ordering::Relaxed);
        let no_backend_failures = self.no_backend_counter.load(Ordering::Relaxed);

        let latency_sum = self.latency_accumulator_ms.load(Ordering::Relaxed);
        let latency_count = self.latency_count.load(Ordering::Relaxed);
        let avg_upstream_latency_ms = if latency_count > 0 {
            latency_sum as f64 / latency_count as f64
        } else {
            0.0
        };

        let elapsed_seconds = self.start_time.elapsed().as_secs_f64();
        let requests_per_second = if elapsed_seconds > 0.0 {
            total_requests as f64 / elapsed_seconds
        } else {
            0.0
        };

        ProxyMetrics {
            total_requests,
            successful_requests,
            rate_limited_requests,
            upstream_failures,
            no_backend_failures,
            avg_upstream_latency_ms,
            requests_per_second,
        }
    }

    /// Spawn a task that logs a metrics snapshot every `interval_seconds`.
    pub fn start_reporting(self: &Arc<Self>, interval_seconds: u64) {
        let collector = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
            loop {
                ticker.tick().await;
                let snapshot = collector.snapshot();
                info!(
                    total = snapshot.total_requests,
                    success = snapshot.successful_requests,
                    rate_limited = snapshot.rate_limited_requests,
                    upstream_failures = snapshot.upstream_failures,
                    no_backend = snapshot.no_backend_failures,
                    avg_latency_ms = snapshot.avg_upstream_latency_ms,
                    rps = snapshot.requests_per_second,
                    "proxy metrics"
                );
            }
        });
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_averages_from_zero_state() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.avg_upstream_latency_ms, 0.0);
    }

    #[test]
    fn tracks_success_and_latency() {
        let collector = MetricsCollector::new();
        collector.record_request();
        collector.record_success(100);
        collector.record_request();
        collector.record_success(200);
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.avg_upstream_latency_ms, 150.0);
    }
}
