//! Request metrics for the values endpoint

use pulse_telemetry::{Counter, Gauge, Histogram, HistogramSnapshot};
use serde::Serialize;

#[derive(Clone)]
pub struct ServiceMetrics {
    pub queries: Counter,
    pub rejected: Counter,
    pub denied: Counter,
    pub storage_failures: Counter,
    pub in_flight: Gauge,
    pub query_latency_ms: Histogram,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub rejected_total: u64,
    pub denied_total: u64,
    pub storage_failures_total: u64,
    pub in_flight: u64,
    pub query_latency_ms: HistogramSnapshot,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            queries: Counter::new(),
            rejected: Counter::new(),
            denied: Counter::new(),
            storage_failures: Counter::new(),
            in_flight: Gauge::new(),
            query_latency_ms: Histogram::new(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_total: self.queries.get(),
            rejected_total: self.rejected.get(),
            denied_total: self.denied.get(),
            storage_failures_total: self.storage_failures.get(),
            in_flight: self.in_flight.get(),
            query_latency_ms: self.query_latency_ms.snapshot(),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
