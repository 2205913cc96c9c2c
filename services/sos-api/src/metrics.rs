//! Request metrics collection and reporting.

use metrics::{counter, histogram};
use serde::Serialize;
use sos_common::Operation;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::binding::Binding;

/// Metrics collector for the SOS pipeline.
///
/// Every recording goes both to the process-wide `metrics` recorder (for
/// Prometheus) and to local counters served by the admin stats endpoint.
#[derive(Debug)]
pub struct MetricsCollector {
    requests: AtomicU64,
    faults: AtomicU64,
    server_errors: AtomicU64,

    per_operation: Mutex<BTreeMap<&'static str, u64>>,
    per_status: Mutex<BTreeMap<u16, u64>>,
    times: Mutex<TimingStats>,

    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    max_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            per_operation: Mutex::new(BTreeMap::new()),
            per_status: Mutex::new(BTreeMap::new()),
            times: Mutex::new(TimingStats::default()),
            start_time: Instant::now(),
        }
    }

    /// Record a decoded request
    pub fn record_request(&self, binding: Binding, operation: Operation) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut per_operation) = self.per_operation.lock() {
            *per_operation.entry(operation.as_str()).or_insert(0) += 1;
        }
        counter!(
            "sos_requests_total",
            "binding" => binding.label(),
            "operation" => operation.as_str()
        )
        .increment(1);
    }

    /// Record a fault answered with `status`
    pub fn record_fault(&self, status: u16) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        if status >= 500 {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut per_status) = self.per_status.lock() {
            *per_status.entry(status).or_insert(0) += 1;
        }
        counter!("sos_faults_total", "status" => status.to_string()).increment(1);
    }

    pub fn record_duration(&self, binding: Binding, timer: &Timer) {
        if let Ok(mut times) = self.times.lock() {
            times.record(timer.elapsed_us());
        }
        histogram!("sos_request_duration_ms", "binding" => binding.label()).record(timer.elapsed_ms());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg_ms, max_ms) = self
            .times
            .lock()
            .map(|t| (t.avg_ms(), t.max_us as f64 / 1000.0))
            .unwrap_or_default();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            per_operation: self
                .per_operation
                .lock()
                .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
                .unwrap_or_default(),
            per_status: self
                .per_status
                .lock()
                .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
                .unwrap_or_default(),
            avg_request_ms: avg_ms,
            max_request_ms: max_ms,
        }
    }
}

/// Serializable view of the collector.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub faults: u64,
    pub server_errors: u64,
    pub per_operation: BTreeMap<String, u64>,
    pub per_status: BTreeMap<String, u64>,
    pub avg_request_ms: f64,
    pub max_request_ms: f64,
}

/// Timer guard for measuring request duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_micros() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let collector = MetricsCollector::new();
        collector.record_request(Binding::Kvp, Operation::GetCapabilities);
        collector.record_request(Binding::Json, Operation::GetCapabilities);
        collector.record_request(Binding::Pox, Operation::DeleteSensor);
        collector.record_fault(400);
        collector.record_fault(500);
        collector.record_duration(Binding::Kvp, &Timer::start());

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.faults, 2);
        assert_eq!(snapshot.server_errors, 1);
        assert_eq!(snapshot.per_operation.get("GetCapabilities"), Some(&2));
        assert_eq!(snapshot.per_status.get("400"), Some(&1));
    }
}
