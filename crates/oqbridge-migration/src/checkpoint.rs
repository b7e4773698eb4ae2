//! Migration progress records and their persistence.
//!
//! A [`Checkpoint`] tracks one in-flight run for an index so a failed run can
//! resume without redoing completed slices. A [`Watermark`] records the upper
//! bound of the last successful run so subsequent runs only process the
//! delta. A checkpoint marked completed is semantically equivalent to no
//! checkpoint at all: `load` never returns one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oqbridge_core::BridgeResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// In-progress migration state for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Index being migrated.
    pub index: String,
    /// When this run started.
    pub started_at: DateTime<Utc>,
    /// Last persistence time, stamped on save.
    pub updated_at: DateTime<Utc>,
    /// Total documents matched by the run's window, when known.
    #[serde(default)]
    pub total_docs: i64,
    /// Documents migrated so far (monotonic sum across slices).
    #[serde(default)]
    pub migrated: i64,
    /// Slice ids that finished their full scroll.
    #[serde(default)]
    pub slices_done: Vec<usize>,
    /// Whether the run finished; a completed checkpoint loads as absent.
    #[serde(default)]
    pub completed: bool,
    /// Upper bound of the run's time window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_time: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// A fresh checkpoint for the given index.
    #[must_use]
    pub fn new(index: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            index: index.into(),
            started_at: now,
            updated_at: now,
            total_docs: 0,
            migrated: 0,
            slices_done: Vec::new(),
            completed: false,
            cutoff_time: None,
        }
    }

    /// Whether the given slice already completed in a previous run.
    #[must_use]
    pub fn is_slice_done(&self, slice_id: usize) -> bool {
        self.slices_done.contains(&slice_id)
    }
}

/// High-water mark of successful migration for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watermark {
    /// Index this watermark belongs to.
    pub index: String,
    /// Upper bound of the last successful migration window; monotonically
    /// non-decreasing across runs.
    pub migrated_before: DateTime<Utc>,
    /// Last persistence time, stamped on save.
    pub updated_at: DateTime<Utc>,
}

/// Checkpoint and watermark persistence.
///
/// Implementations: [`LocalCheckpointStore`] on the local filesystem for
/// single-instance deployments, and the hot-store-backed store in
/// [`crate::state_store`] for multi-instance deployments where progress must
/// be visible to every migrator.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Reads the checkpoint for an index. Returns `None` when absent or when
    /// the previous run completed.
    async fn load(&self, index: &str) -> BridgeResult<Option<Checkpoint>>;

    /// Persists a checkpoint, stamping its `updated_at`.
    async fn save(&self, checkpoint: &Checkpoint) -> BridgeResult<()>;

    /// Marks the index's checkpoint as completed.
    async fn mark_complete(&self, index: &str) -> BridgeResult<()>;

    /// Reads the watermark for an index. Returns `None` on first run.
    async fn load_watermark(&self, index: &str) -> BridgeResult<Option<Watermark>>;

    /// Persists a watermark, stamping its `updated_at`.
    async fn save_watermark(&self, watermark: &Watermark) -> BridgeResult<()>;
}

/// Checkpoint persistence on the local filesystem: two JSON files per index
/// under one directory.
pub struct LocalCheckpointStore {
    dir: PathBuf,
}

impl LocalCheckpointStore {
    /// Creates the store, making the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> BridgeResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn checkpoint_path(&self, index: &str) -> PathBuf {
        self.dir.join(format!("{}.checkpoint.json", safe_name(index)))
    }

    fn watermark_path(&self, index: &str) -> PathBuf {
        self.dir.join(format!("{}.watermark.json", safe_name(index)))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> BridgeResult<Option<T>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> BridgeResult<()> {
        let data = serde_json::to_vec_pretty(value)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Strips directory components so an index name is a safe file stem.
fn safe_name(index: &str) -> &str {
    index
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(index)
}

#[async_trait]
impl CheckpointStore for LocalCheckpointStore {
    async fn load(&self, index: &str) -> BridgeResult<Option<Checkpoint>> {
        let checkpoint: Option<Checkpoint> = Self::read_json(&self.checkpoint_path(index))?;
        Ok(checkpoint.filter(|cp| !cp.completed))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> BridgeResult<()> {
        let mut stamped = checkpoint.clone();
        stamped.updated_at = Utc::now();
        Self::write_json(&self.checkpoint_path(&stamped.index), &stamped)
    }

    async fn mark_complete(&self, index: &str) -> BridgeResult<()> {
        let mut checkpoint = self.load(index).await?.unwrap_or_else(|| Checkpoint::new(index));
        checkpoint.completed = true;
        self.save(&checkpoint).await
    }

    async fn load_watermark(&self, index: &str) -> BridgeResult<Option<Watermark>> {
        Self::read_json(&self.watermark_path(index))
    }

    async fn save_watermark(&self, watermark: &Watermark) -> BridgeResult<()> {
        let mut stamped = watermark.clone();
        stamped.updated_at = Utc::now();
        Self::write_json(&self.watermark_path(&stamped.index), &stamped)
    }
}
