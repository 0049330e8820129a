//! In-memory metrics sink.
//!
//! The engine owns an `Arc<dyn MetricsSink>` rather than mutable counters of
//! its own, so tests can inject a fresh sink and hosts can forward the same
//! calls to an external exporter.

use std::{collections::BTreeMap, time::Duration};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use aegis_contracts::result::RiskLevel;

use crate::traits::MetricsSink;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successes: u64,
    pub total_latency: Duration,
    pub risk_distribution: BTreeMap<RiskLevel, u64>,
}

impl MetricsSnapshot {
    pub fn average_latency_ms(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_latency.as_secs_f64() * 1000.0 / self.total as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

/// Default sink keeping counters behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record(&self, latency: Duration, outcome: Option<RiskLevel>) {
        let mut inner = self.inner.lock();
        inner.total += 1;
        inner.total_latency += latency;
        if let Some(level) = outcome {
            inner.successes += 1;
            *inner.risk_distribution.entry(level).or_insert(0) += 1;
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().clone()
    }
}
