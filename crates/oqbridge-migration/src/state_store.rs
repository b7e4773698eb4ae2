//! Checkpoint and watermark persistence in the hot store.
//!
//! Progress documents live in a shared coordination index, so every migrator
//! instance sees them. Together with the distributed lock this enables
//! lock-mediated work handoff: if an instance crashes, another resumes from
//! the persisted checkpoint after the lock expires.

use crate::checkpoint::{Checkpoint, CheckpointStore, Watermark};
use async_trait::async_trait;
use chrono::Utc;
use oqbridge_backend::{HotStore, PutDocOptions};
use oqbridge_core::BridgeResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Coordination index holding checkpoint and watermark documents.
pub const STATE_INDEX: &str = ".oqbridge-state";

/// Checkpoint store backed by the hot store's coordination index.
pub struct HotCheckpointStore {
    hot: Arc<dyn HotStore>,
}

impl HotCheckpointStore {
    /// Creates a store over the given hot-store client.
    #[must_use]
    pub fn new(hot: Arc<dyn HotStore>) -> Self {
        Self { hot }
    }

    async fn get<T: DeserializeOwned>(&self, id: &str) -> BridgeResult<Option<T>> {
        let Some(doc) = self.hot.get_doc(STATE_INDEX, id).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(doc.source)?))
    }

    /// Writes a document, creating the coordination index and retrying once
    /// when it does not exist yet.
    async fn put<T: Serialize>(&self, id: &str, value: &T) -> BridgeResult<()> {
        let body: Value = serde_json::to_value(value)?;
        let opts = PutDocOptions {
            create_only: false,
            refresh: true,
        };
        match self.hot.put_doc(STATE_INDEX, id, &body, opts).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                self.hot.create_coordination_index(STATE_INDEX, None).await?;
                self.hot.put_doc(STATE_INDEX, id, &body, opts).await
            }
            Err(err) => Err(err),
        }
    }
}

fn checkpoint_id(index: &str) -> String {
    format!("checkpoint-{index}")
}

fn watermark_id(index: &str) -> String {
    format!("watermark-{index}")
}

#[async_trait]
impl CheckpointStore for HotCheckpointStore {
    async fn load(&self, index: &str) -> BridgeResult<Option<Checkpoint>> {
        let checkpoint: Option<Checkpoint> = self.get(&checkpoint_id(index)).await?;
        Ok(checkpoint.filter(|cp| !cp.completed))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> BridgeResult<()> {
        let mut stamped = checkpoint.clone();
        stamped.updated_at = Utc::now();
        self.put(&checkpoint_id(&stamped.index), &stamped).await
    }

    async fn mark_complete(&self, index: &str) -> BridgeResult<()> {
        let mut checkpoint = self.load(index).await?.unwrap_or_else(|| Checkpoint::new(index));
        checkpoint.completed = true;
        self.save(&checkpoint).await
    }

    async fn load_watermark(&self, index: &str) -> BridgeResult<Option<Watermark>> {
        self.get(&watermark_id(index)).await
    }

    async fn save_watermark(&self, watermark: &Watermark) -> BridgeResult<()> {
        let mut stamped = watermark.clone();
        stamped.updated_at = Utc::now();
        self.put(&watermark_id(&stamped.index), &stamped).await
    }
}
