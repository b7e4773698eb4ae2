//! Per-index migration orchestration.
//!
//! `migrate_index` runs the full state machine: lock, ensure the cold index,
//! load checkpoint and watermark, scroll the `[watermark, cutoff)` window
//! with parallel sliced workers, and finalize by advancing the watermark.
//! Slices that completed in a previous failed run are skipped on resume, and
//! a partial failure persists the checkpoint so the next run picks up where
//! this one stopped.

use crate::checkpoint::{Checkpoint, CheckpointStore, Watermark};
use crate::distlock::DistLock;
use crate::metrics::{MetricsRecorder, MigrationMetric};
use crate::transform::transform_batch;
use chrono::{DateTime, SecondsFormat, Utc};
use oqbridge_backend::{ColdStore, HotStore, ScrollSlice};
use oqbridge_core::{BridgeError, BridgeResult, Config};
use oqbridge_query::contains_wildcard;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const SCROLL_KEEP_ALIVE: &str = "10m";

/// Real-time progress counters shared by the slice workers and the reporter.
struct Progress {
    migrated: AtomicI64,
    total_docs: AtomicI64,
    started: Instant,
}

impl Progress {
    fn new() -> Self {
        Self {
            migrated: AtomicI64::new(0),
            total_docs: AtomicI64::new(0),
            started: Instant::now(),
        }
    }
}

/// Moves documents older than the migration threshold from the hot store to
/// the cold store using parallel sliced scroll workers.
pub struct Migrator {
    cfg: Arc<Config>,
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    lock: Option<Arc<dyn DistLock>>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
    progress_interval: Duration,
}

impl Migrator {
    /// Creates a migrator with the given collaborators.
    #[must_use]
    pub fn new(
        cfg: Arc<Config>,
        hot: Arc<dyn HotStore>,
        cold: Arc<dyn ColdStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            cfg,
            hot,
            cold,
            checkpoints,
            lock: None,
            metrics: None,
            progress_interval: Duration::from_secs(10),
        }
    }

    /// Enables distributed locking so multiple migrator instances never work
    /// on the same index concurrently.
    #[must_use]
    pub fn with_lock(mut self, lock: Arc<dyn DistLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Enables per-run metric recording.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Overrides the progress reporting interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Migrates all configured index patterns. Per-index errors are logged
    /// and do not abort the batch.
    pub async fn migrate_all(&self) -> BridgeResult<()> {
        let patterns = &self.cfg.migration.indices;
        if patterns.is_empty() {
            info!("no indices configured for migration, skipping");
            return Ok(());
        }

        for pattern in patterns {
            let concrete = match self.resolve_pattern(pattern).await {
                Ok(concrete) => concrete,
                Err(err) => {
                    error!(pattern = %pattern, error = %err, "failed to resolve index pattern");
                    continue;
                }
            };
            for index in concrete {
                if let Err(err) = self.migrate_index(&index).await {
                    error!(index = %index, error = %err, "migration failed for index");
                }
            }
        }
        Ok(())
    }

    /// Expands a wildcard pattern to concrete index names; a plain name is
    /// returned as-is.
    async fn resolve_pattern(&self, pattern: &str) -> BridgeResult<Vec<String>> {
        if !contains_wildcard(pattern) {
            return Ok(vec![pattern.to_string()]);
        }
        let resolved = self.hot.resolve_indices(pattern).await?;
        info!(pattern = %pattern, count = resolved.len(), "resolved index pattern");
        Ok(resolved)
    }

    /// Migrates one index, holding the distributed lock for the duration
    /// when locking is configured.
    pub async fn migrate_index(&self, index: &str) -> BridgeResult<()> {
        if let Some(lock) = &self.lock {
            let ttl = Duration::from_secs(self.cfg.migration.lock_ttl_secs);
            let acquired = lock
                .acquire(index, ttl)
                .await
                .map_err(|e| BridgeError::internal(format!("acquiring migration lock: {e}")))?;
            if !acquired {
                info!(index = %index, "skipping index, migration lock held by another instance");
                return Ok(());
            }
        }

        let result = self.run_migration(index).await;

        if let Some(lock) = &self.lock {
            if let Err(err) = lock.release(index).await {
                warn!(index = %index, error = %err, "failed to release migration lock");
            }
        }
        result
    }

    async fn run_migration(&self, index: &str) -> BridgeResult<()> {
        let ts_field = self.cfg.timestamp_field_for(index).to_string();
        let workers = self.cfg.migration.workers;
        let batch_size = self.cfg.migration.batch_size;

        self.ensure_cold_index(index, &ts_field).await?;

        let checkpoint = match self.checkpoints.load(index).await {
            Ok(cp) => cp,
            Err(err) => {
                warn!(index = %index, error = %err, "failed to load checkpoint, starting fresh");
                None
            }
        };
        let watermark = match self.checkpoints.load_watermark(index).await {
            Ok(wm) => wm,
            Err(err) => {
                warn!(index = %index, error = %err, "failed to load watermark, will migrate all old data");
                None
            }
        };

        let cutoff = Utc::now() - chrono::Duration::days(self.cfg.migration.migrate_after_days);
        let window_from = watermark
            .as_ref()
            .map(|wm| wm.migrated_before)
            .filter(|t| t.timestamp() != 0);

        info!(
            index = %index,
            timestamp_field = %ts_field,
            migrate_after_days = self.cfg.migration.migrate_after_days,
            cutoff = %cutoff.to_rfc3339_opts(SecondsFormat::Secs, true),
            watermark = %window_from
                .map_or_else(|| "none (first run)".to_string(), |t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            workers,
            batch_size,
            resuming = checkpoint.is_some(),
            "starting migration"
        );

        let started_at = Utc::now();
        let progress = Arc::new(Progress::new());

        let mut checkpoint = checkpoint.unwrap_or_else(|| {
            let mut cp = Checkpoint::new(index);
            cp.cutoff_time = Some(cutoff);
            cp
        });
        // Snapshot completed slices before workers start mutating the set.
        let done_slices: HashSet<usize> = checkpoint.slices_done.iter().copied().collect();
        let checkpoint = Arc::new(Mutex::new(checkpoint));

        let query = build_window_query(&ts_field, window_from, cutoff, Some(batch_size));
        let query_bytes = serde_json::to_vec(&query)?;

        let mut handles = Vec::new();
        for slice_id in 0..workers {
            if done_slices.contains(&slice_id) {
                info!(index = %index, slice = slice_id, "skipping completed slice");
                continue;
            }
            handles.push(tokio::spawn(migrate_slice(
                self.hot.clone(),
                self.cold.clone(),
                self.checkpoints.clone(),
                checkpoint.clone(),
                progress.clone(),
                index.to_string(),
                query_bytes.clone(),
                slice_id,
                workers,
            )));
        }

        let reporter = tokio::spawn(report_progress(
            index.to_string(),
            progress.clone(),
            self.progress_interval,
        ));

        let mut slice_errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => slice_errors.push(err),
                Err(join_err) => slice_errors.push(BridgeError::internal(format!(
                    "slice worker panicked: {join_err}"
                ))),
            }
        }
        reporter.abort();

        let total_migrated = progress.migrated.load(Ordering::Relaxed);

        if !slice_errors.is_empty() {
            // Persist progress so the next run resumes instead of restarting.
            let snapshot = checkpoint.lock().await.clone();
            if let Err(err) = self.checkpoints.save(&snapshot).await {
                warn!(index = %index, error = %err, "failed to save checkpoint after slice errors");
            }
            let err = BridgeError::internal(format!(
                "migration had {} slice errors, first: {}",
                slice_errors.len(),
                slice_errors[0]
            ));
            self.record_metric(index, started_at, total_migrated, cutoff, Some(err.to_string()))
                .await;
            return Err(err);
        }

        if self.cfg.migration.delete_after_migration && total_migrated > 0 {
            info!(index = %index, count = total_migrated, "deleting migrated documents from hot store");
            let delete_query = build_window_query(&ts_field, window_from, cutoff, None);
            if let Err(err) = self
                .hot
                .delete_by_query(index, &serde_json::to_vec(&delete_query)?)
                .await
            {
                let err =
                    BridgeError::internal(format!("deleting migrated documents: {err}"));
                self.record_metric(index, started_at, total_migrated, cutoff, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        }

        if let Err(err) = self.checkpoints.mark_complete(index).await {
            warn!(index = %index, error = %err, "failed to mark checkpoint complete");
        }
        let watermark = Watermark {
            index: index.to_string(),
            migrated_before: cutoff,
            updated_at: Utc::now(),
        };
        if let Err(err) = self.checkpoints.save_watermark(&watermark).await {
            warn!(index = %index, error = %err, "failed to save watermark");
        }

        self.record_metric(index, started_at, total_migrated, cutoff, None)
            .await;

        let elapsed = progress.started.elapsed();
        info!(
            index = %index,
            total_migrated,
            elapsed_sec = elapsed.as_secs(),
            docs_per_sec = (total_migrated as f64 / elapsed.as_secs_f64().max(0.001)) as i64,
            "migration completed"
        );
        Ok(())
    }

    async fn ensure_cold_index(&self, index: &str, ts_field: &str) -> BridgeResult<()> {
        let exists = self
            .cold
            .index_exists(index)
            .await
            .map_err(|e| BridgeError::internal(format!("checking cold index existence: {e}")))?;
        if exists {
            return Ok(());
        }
        let cold_days = self.cfg.cold_days_for(index);
        info!(index = %index, timestamp_field = %ts_field, retention_days = cold_days, "creating cold index");
        self.cold
            .create_index(index, ts_field, cold_days)
            .await
            .map_err(|e| BridgeError::internal(format!("creating cold index: {e}")))
    }

    async fn record_metric(
        &self,
        index: &str,
        started_at: DateTime<Utc>,
        migrated: i64,
        cutoff: DateTime<Utc>,
        error: Option<String>,
    ) {
        let Some(metrics) = &self.metrics else { return };
        let metric = MigrationMetric::finished(
            index,
            started_at,
            migrated,
            cutoff,
            self.cfg.migration.workers,
            self.cfg.migration.batch_size,
            error,
        );
        if let Err(err) = metrics.record(&metric).await {
            warn!(index = %index, error = %err, "failed to record migration metric");
        }
    }
}

/// Scrolls one slice of the window, ingesting each page into the cold store
/// and folding the slice's counters into the shared checkpoint at completion.
#[allow(clippy::too_many_arguments)]
async fn migrate_slice(
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    store: Arc<dyn CheckpointStore>,
    checkpoint: Arc<Mutex<Checkpoint>>,
    progress: Arc<Progress>,
    index: String,
    query: Vec<u8>,
    slice_id: usize,
    slice_max: usize,
) -> BridgeResult<()> {
    info!(index = %index, slice = slice_id, max = slice_max, "slice worker starting");

    let slice = ScrollSlice {
        id: slice_id,
        max: slice_max,
    };
    let mut page = hot
        .scroll_start(&index, &query, Some(slice), SCROLL_KEEP_ALIVE)
        .await
        .map_err(|e| BridgeError::internal(format!("slice {slice_id}: initiating scroll: {e}")))?;

    progress.total_docs.fetch_add(page.total, Ordering::Relaxed);
    let mut last_scroll_id = page.scroll_id.clone();
    let mut slice_migrated: i64 = 0;

    let outcome: BridgeResult<()> = loop {
        if page.hits.is_empty() {
            break Ok(());
        }

        let docs = match transform_batch(&page.hits) {
            Ok(docs) => docs,
            Err(err) => {
                break Err(BridgeError::internal(format!(
                    "slice {slice_id}: transforming batch: {err}"
                )))
            }
        };
        if let Err(err) = cold.bulk_ingest(&index, &docs).await {
            break Err(BridgeError::internal(format!(
                "slice {slice_id}: ingesting batch: {err}"
            )));
        }

        slice_migrated += docs.len() as i64;
        progress.migrated.fetch_add(docs.len() as i64, Ordering::Relaxed);

        match hot.scroll_next(&last_scroll_id, SCROLL_KEEP_ALIVE).await {
            Ok(next) => {
                if !next.scroll_id.is_empty() {
                    last_scroll_id = next.scroll_id.clone();
                }
                page = next;
            }
            Err(err) => {
                break Err(BridgeError::internal(format!(
                    "slice {slice_id}: continuing scroll: {err}"
                )))
            }
        }
    };

    if !last_scroll_id.is_empty() {
        if let Err(err) = hot.clear_scroll(&last_scroll_id).await {
            warn!(slice = slice_id, error = %err, "failed to clear scroll");
        }
    }
    outcome?;

    // Fold this slice into the shared checkpoint; a save failure is fatal to
    // the slice because resume correctness depends on it.
    {
        let mut cp = checkpoint.lock().await;
        if !cp.is_slice_done(slice_id) {
            cp.slices_done.push(slice_id);
        }
        cp.migrated += slice_migrated;
        store
            .save(&cp)
            .await
            .map_err(|e| BridgeError::internal(format!("slice {slice_id}: saving checkpoint: {e}")))?;
    }

    info!(index = %index, slice = slice_id, migrated = slice_migrated, "slice worker completed");
    Ok(())
}

async fn report_progress(index: String, progress: Arc<Progress>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately
    loop {
        ticker.tick().await;
        let migrated = progress.migrated.load(Ordering::Relaxed);
        let total = progress.total_docs.load(Ordering::Relaxed);
        let elapsed = progress.started.elapsed();
        let rate = migrated as f64 / elapsed.as_secs_f64().max(0.001);
        info!(
            index = %index,
            migrated,
            total_docs = total,
            elapsed_sec = elapsed.as_secs(),
            docs_per_sec = rate as i64,
            "migration progress"
        );
    }
}

/// Builds the range query for the incremental window `[from, cutoff)`. With
/// `page_size` set the query also carries the scroll page size and an
/// ascending sort on the timestamp field; without it the query is suitable
/// for delete-by-query over the same window.
fn build_window_query(
    ts_field: &str,
    from: Option<DateTime<Utc>>,
    cutoff: DateTime<Utc>,
    page_size: Option<usize>,
) -> Value {
    let mut range = json!({
        "lt": cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
    });
    if let Some(from) = from {
        range["gte"] = json!(from.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    let mut query = json!({
        "query": {"range": {ts_field: range}}
    });
    if let Some(size) = page_size {
        query["size"] = json!(size);
        query["sort"] = json!([{ts_field: "asc"}]);
    }
    query
}
