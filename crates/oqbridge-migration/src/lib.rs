//! Parallel, resumable hot-to-cold migration.
//!
//! The driver scrolls each index's `[watermark, cutoff)` window with sliced
//! parallel readers, ingests the documents into the cold store, and records
//! durable progress so runs resume across failures and instances. Multi-
//! instance coordination uses hot-store-hosted documents: a distributed lock,
//! shared checkpoints and watermarks, and per-run metrics.

pub mod checkpoint;
pub mod distlock;
pub mod metrics;
pub mod migrator;
pub mod state_store;
pub mod transform;

#[cfg(test)]
pub(crate) mod testutil;

pub use checkpoint::{Checkpoint, CheckpointStore, LocalCheckpointStore, Watermark};
pub use distlock::{DistLock, HotStoreLock, LockRecord, NoopLock, LOCK_INDEX};
pub use metrics::{
    HotMetricsStore, MetricsRecorder, MigrationMetric, NoopMetricsRecorder, METRICS_INDEX,
};
pub use migrator::Migrator;
pub use state_store::{HotCheckpointStore, STATE_INDEX};
pub use transform::{extract_source, transform_batch};
