//! Per-run migration metrics persisted to the hot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oqbridge_backend::{HotStore, PutDocOptions};
use oqbridge_core::BridgeResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Coordination index holding migration metric documents.
pub const METRICS_INDEX: &str = ".oqbridge-migration-metrics";

/// Outcome of a single index migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationMetric {
    /// Event time.
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Migrated index.
    pub index: String,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Run end time.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_sec: f64,
    /// Documents copied to the cold store.
    pub documents_migrated: i64,
    /// Throughput over the whole run.
    pub docs_per_sec: f64,
    /// Parallel slice workers used.
    pub workers: usize,
    /// Scroll page size used.
    pub batch_size: usize,
    /// `"success"` or `"failed"`.
    pub status: String,
    /// First error, for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Upper bound of the migrated window.
    pub cutoff_time: DateTime<Utc>,
}

impl MigrationMetric {
    /// Builds a metric for a finished run.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn finished(
        index: &str,
        started_at: DateTime<Utc>,
        documents_migrated: i64,
        cutoff: DateTime<Utc>,
        workers: usize,
        batch_size: usize,
        error: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let elapsed = (now - started_at).num_milliseconds() as f64 / 1000.0;
        let docs_per_sec = if elapsed > 0.0 {
            documents_migrated as f64 / elapsed
        } else {
            0.0
        };
        Self {
            timestamp: now,
            index: index.to_string(),
            started_at,
            completed_at: now,
            duration_sec: elapsed,
            documents_migrated,
            docs_per_sec,
            workers,
            batch_size,
            status: if error.is_none() { "success" } else { "failed" }.to_string(),
            error,
            cutoff_time: cutoff,
        }
    }

    /// Deterministic document id so a retried write lands on the same
    /// document instead of duplicating the metric.
    #[must_use]
    pub fn doc_id(&self) -> String {
        format!("metric-{}-{}", self.index, self.started_at.timestamp())
    }
}

/// Persists migration metrics for later analysis.
#[async_trait]
pub trait MetricsRecorder: Send + Sync {
    /// Records one run's metric.
    async fn record(&self, metric: &MigrationMetric) -> BridgeResult<()>;
}

/// Metrics recorder backed by the hot store.
pub struct HotMetricsStore {
    hot: Arc<dyn HotStore>,
}

impl HotMetricsStore {
    /// Creates a recorder over the given hot-store client.
    #[must_use]
    pub fn new(hot: Arc<dyn HotStore>) -> Self {
        Self { hot }
    }

    fn index_mappings() -> Value {
        json!({
            "properties": {
                "@timestamp":         {"type": "date"},
                "index":              {"type": "keyword"},
                "started_at":         {"type": "date"},
                "completed_at":       {"type": "date"},
                "duration_sec":       {"type": "float"},
                "documents_migrated": {"type": "long"},
                "docs_per_sec":       {"type": "float"},
                "workers":            {"type": "integer"},
                "batch_size":         {"type": "integer"},
                "status":             {"type": "keyword"},
                "error":              {"type": "text"},
                "cutoff_time":        {"type": "date"}
            }
        })
    }
}

#[async_trait]
impl MetricsRecorder for HotMetricsStore {
    async fn record(&self, metric: &MigrationMetric) -> BridgeResult<()> {
        let id = metric.doc_id();
        let body = serde_json::to_value(metric)?;
        let opts = PutDocOptions::default();
        match self.hot.put_doc(METRICS_INDEX, &id, &body, opts).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                self.hot
                    .create_coordination_index(METRICS_INDEX, Some(&Self::index_mappings()))
                    .await?;
                self.hot.put_doc(METRICS_INDEX, &id, &body, opts).await
            }
            Err(err) => Err(err),
        }
    }
}

/// Recorder that drops all metrics, for deployments without a metrics index.
pub struct NoopMetricsRecorder;

#[async_trait]
impl MetricsRecorder for NoopMetricsRecorder {
    async fn record(&self, _metric: &MigrationMetric) -> BridgeResult<()> {
        Ok(())
    }
}
