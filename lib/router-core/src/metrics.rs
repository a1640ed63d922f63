//! Prometheus metrics for projection synchronization

use crate::sync::SyncOutcome;
use crate::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Which engine path produced an outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPath {
    Upsert,
    Teardown,
}

impl SyncPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPath::Upsert => "upsert",
            SyncPath::Teardown => "teardown",
        }
    }
}

/// Counters and timings for sync passes
#[derive(Clone)]
pub struct SyncMetrics {
    /// Sync passes by path and outcome (done, requeue, error)
    pub sync_outcomes_total: IntCounterVec,
    /// Writes to the projection store by kind of the projected object
    pub projection_writes_total: IntCounterVec,
    /// Duration of sync passes in seconds
    pub sync_duration_seconds: HistogramVec,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl SyncMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let sync_outcomes_total = IntCounterVec::new(
            Opts::new("sync_outcomes_total", "Projection sync passes by outcome"),
            &["path", "outcome"],
        )?;

        let projection_writes_total = IntCounterVec::new(
            Opts::new(
                "projection_writes_total",
                "Entries written to or removed from the projection store",
            ),
            &["kind"],
        )?;

        let sync_duration_seconds = HistogramVec::new(
            HistogramOpts::new("sync_duration_seconds", "Duration of projection sync passes")
                .buckets(prometheus::exponential_buckets(0.001, 10.0, 5)?),
            &["path"],
        )?;

        registry.register(Box::new(sync_outcomes_total.clone()))?;
        registry.register(Box::new(projection_writes_total.clone()))?;
        registry.register(Box::new(sync_duration_seconds.clone()))?;

        Ok(Self {
            sync_outcomes_total,
            projection_writes_total,
            sync_duration_seconds,
            registry,
        })
    }

    /// Record the result of one engine pass
    pub fn observe(&self, path: SyncPath, result: &Result<SyncOutcome>, elapsed: Duration) {
        let outcome = match result {
            Ok(SyncOutcome::Done) => "done",
            Ok(SyncOutcome::Requeue) => "requeue",
            Err(_) => "error",
        };
        self.sync_outcomes_total
            .with_label_values(&[path.as_str(), outcome])
            .inc();
        self.sync_duration_seconds
            .with_label_values(&[path.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_write(&self, kind: &str) {
        self.projection_writes_total.with_label_values(&[kind]).inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
