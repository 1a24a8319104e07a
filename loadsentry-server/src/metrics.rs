// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pipeline counters and Prometheus exposition
//!
//! The queue and the pipeline never touch a global registry. They receive a
//! [`PipelineCounters`] handle at construction and report through it.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Registry, TextEncoder};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink for the monotonic counters the pipeline produces.
pub trait PipelineCounters: Send + Sync {
    /// A sample was accepted into the ingest queue.
    fn sample_accepted(&self);
    /// A sample was dropped because the ingest queue was full.
    fn sample_rejected(&self);
    /// A processed sample was flagged as anomalous.
    fn anomaly_detected(&self);
    /// A side store write failed, timed out or was dropped.
    fn store_failed(&self);
}

/// Plain atomic counters.
#[derive(Debug, Default)]
pub struct AtomicCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    anomalies: AtomicU64,
    store_failures: AtomicU64,
}

/// Point-in-time copy of [`AtomicCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub anomalies: u64,
    pub store_failures: u64,
}

impl AtomicCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

impl PipelineCounters for AtomicCounters {
    fn sample_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn sample_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn anomaly_detected(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    fn store_failed(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Prometheus-backed counters plus the HTTP latency histogram.
///
/// Owns its own [`Registry`] so several instances (e.g. in tests) never
/// collide on metric names.
pub struct PrometheusMetrics {
    registry: Registry,
    ingest_total: IntCounter,
    rejected_total: IntCounter,
    anomaly_total: IntCounter,
    store_failures_total: IntCounter,
    request_latency: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ingest_total = IntCounter::new("metrics_ingest_total", "Total accepted metrics.")?;
        let rejected_total = IntCounter::new(
            "metrics_rejected_total",
            "Total metrics dropped because the ingest queue was full.",
        )?;
        let anomaly_total =
            IntCounter::new("metrics_anomaly_total", "Total detected anomalies.")?;
        let store_failures_total = IntCounter::new(
            "metrics_store_failures_total",
            "Total side store writes that failed, timed out or were dropped.",
        )?;
        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds.",
            ),
            &["path", "code"],
        )?;

        registry.register(Box::new(ingest_total.clone()))?;
        registry.register(Box::new(rejected_total.clone()))?;
        registry.register(Box::new(anomaly_total.clone()))?;
        registry.register(Box::new(store_failures_total.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;

        Ok(Self {
            registry,
            ingest_total,
            rejected_total,
            anomaly_total,
            store_failures_total,
            request_latency,
        })
    }

    /// Record one HTTP request.
    pub fn observe_request(&self, path: &str, code: u16, elapsed: Duration) {
        self.request_latency
            .with_label_values(&[path, &code.to_string()])
            .observe(elapsed.as_secs_f64());
    }

    /// Dump all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buf) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }

    pub fn ingest_total(&self) -> u64 {
        self.ingest_total.get()
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected_total.get()
    }

    pub fn anomaly_total(&self) -> u64 {
        self.anomaly_total.get()
    }

    pub fn store_failures_total(&self) -> u64 {
        self.store_failures_total.get()
    }
}

impl PipelineCounters for PrometheusMetrics {
    fn sample_accepted(&self) {
        self.ingest_total.inc();
    }

    fn sample_rejected(&self) {
        self.rejected_total.inc();
    }

    fn anomaly_detected(&self) {
        self.anomaly_total.inc();
    }

    fn store_failed(&self) {
        self.store_failures_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_counters() {
        let counters = AtomicCounters::new();
        counters.sample_accepted();
        counters.sample_accepted();
        counters.sample_rejected();
        counters.anomaly_detected();

        let snap = counters.snapshot();
        assert_eq!(snap.accepted, 2);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.anomalies, 1);
        assert_eq!(snap.store_failures, 0);
    }

    #[test]
    fn test_prometheus_render() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.sample_accepted();
        metrics.anomaly_detected();
        metrics.observe_request("/ingest", 202, Duration::from_millis(3));

        assert_eq!(metrics.ingest_total(), 1);
        assert_eq!(metrics.anomaly_total(), 1);

        let body = metrics.render();
        assert!(body.contains("metrics_ingest_total 1"));
        assert!(body.contains("metrics_anomaly_total 1"));
        assert!(body.contains("metrics_rejected_total 0"));
        assert!(body.contains("http_request_duration_seconds_count{code=\"202\",path=\"/ingest\"} 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = PrometheusMetrics::new().unwrap();
        let b = PrometheusMetrics::new().unwrap();
        a.sample_accepted();
        assert_eq!(a.ingest_total(), 1);
        assert_eq!(b.ingest_total(), 0);
    }
}
