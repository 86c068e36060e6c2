//! Request metrics and latency tracking for the inference server.

use crate::models::BackendKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept per backend before the oldest half is dropped
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for prediction requests
pub struct ServingMetrics {
    /// Total prediction requests received
    pub requests_total: AtomicU64,
    /// Requests answered with a prediction
    pub predictions_ok: AtomicU64,
    /// Requests answered with an error
    pub errors_total: AtomicU64,
    /// Errors by kind name
    errors_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Successful prediction latencies (in microseconds) by backend
    latencies: RwLock<HashMap<BackendKind, Vec<u64>>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServingMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            predictions_ok: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            errors_by_kind: RwLock::new(HashMap::new()),
            latencies: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_success(&self, kind: BackendKind, latency: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.predictions_ok.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut latencies) = self.latencies.write() {
            let samples = latencies.entry(kind).or_default();
            samples.push(latency.as_micros() as u64);
            if samples.len() > MAX_SAMPLES {
                samples.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Record a failed request
    pub fn record_error(&self, kind: &'static str) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.errors_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.errors_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    /// Get latency statistics for one backend
    pub fn get_latency_stats(&self, kind: BackendKind) -> LatencyStats {
        self.latencies
            .read()
            .ok()
            .and_then(|latencies| latencies.get(&kind).map(|s| LatencyStats::from_samples(s)))
            .unwrap_or_default()
    }

    /// Get errors by kind
    pub fn get_errors_by_kind(&self) -> HashMap<&'static str, u64> {
        self.errors_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_total.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let ok = self.predictions_ok.load(Ordering::Relaxed);
        let errors = self.errors_total.load(Ordering::Relaxed);
        let error_rate = if requests > 0 {
            (errors as f64 / requests as f64) * 100.0
        } else {
            0.0
        };

        info!(
            requests,
            predictions = ok,
            errors,
            error_rate = format!("{:.1}%", error_rate),
            throughput = format!("{:.1} req/s", self.get_throughput()),
            "Serving metrics summary"
        );

        for kind in [
            BackendKind::TabularEstimator,
            BackendKind::KerasNetwork,
            BackendKind::LiteInterpreter,
        ] {
            let stats = self.get_latency_stats(kind);
            if stats.count == 0 {
                continue;
            }
            info!(
                backend = %kind,
                calls = stats.count,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p95_us = stats.p95_us,
                p99_us = stats.p99_us,
                max_us = stats.max_us,
                "Prediction latency"
            );
        }

        for (kind, count) in self.get_errors_by_kind() {
            info!(error_kind = kind, count, "Errors by kind");
        }
    }
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        Self {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServingMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServingMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task; returns at once when the interval is 0
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
