//! Distributed locking for migration coordination.
//!
//! When multiple migrator instances run concurrently, a [`DistLock`] prevents
//! them from migrating the same index simultaneously. The hot-store-backed
//! implementation relies on atomic document creation (`op_type=create`) and
//! optimistic concurrency control for safe expired-lock cleanup, so no extra
//! infrastructure is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oqbridge_backend::{HotStore, PutDocOptions};
use oqbridge_core::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Coordination index holding lock documents.
pub const LOCK_INDEX: &str = ".oqbridge-locks";

/// Distributed lock over a string key.
#[async_trait]
pub trait DistLock: Send + Sync {
    /// Attempts to acquire the lock for `key` with the given TTL. Returns
    /// `true` on acquisition, `false` when another instance holds it.
    async fn acquire(&self, key: &str, ttl: Duration) -> BridgeResult<bool>;

    /// Releases the lock for `key`. Releasing an already-gone lock succeeds.
    async fn release(&self, key: &str) -> BridgeResult<()>;
}

/// Lock record stored per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// Owning instance, `hostname-pid`.
    pub owner: String,
    /// Acquisition time.
    pub acquired_at: DateTime<Utc>,
    /// Expiry after which the lock may be reclaimed.
    pub expires_at: DateTime<Utc>,
}

/// Distributed lock backed by hot-store documents.
pub struct HotStoreLock {
    hot: Arc<dyn HotStore>,
    owner: String,
}

impl HotStoreLock {
    /// Creates a lock client whose owner id is `hostname-pid`.
    #[must_use]
    pub fn new(hot: Arc<dyn HotStore>) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        let owner = format!("{hostname}-{}", std::process::id());
        Self { hot, owner }
    }

    /// Overrides the owner id (used in tests).
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Attempts the atomic create. `Ok(true)` on acquisition, `Ok(false)`
    /// when the lock is held, a not-found error when the lock index is
    /// missing.
    async fn try_create(&self, key: &str, ttl: Duration) -> BridgeResult<bool> {
        let now = Utc::now();
        let record = LockRecord {
            owner: self.owner.clone(),
            acquired_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(2)),
        };
        let body = serde_json::to_value(&record)?;
        let opts = PutDocOptions {
            create_only: true,
            refresh: true,
        };
        match self.hot.put_doc(LOCK_INDEX, key, &body, opts).await {
            Ok(()) => Ok(true),
            // Document already exists: lock held by another instance.
            Err(BridgeError::Status { status: 409, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Deletes an expired lock using optimistic concurrency so two instances
    /// cannot both reclaim and then both acquire. Errors are swallowed; the
    /// subsequent atomic create is the true decision point.
    async fn cleanup_expired(&self, key: &str) -> BridgeResult<()> {
        let Some(doc) = self.hot.get_doc(LOCK_INDEX, key).await? else {
            return Ok(());
        };
        let record: LockRecord = serde_json::from_value(doc.source)?;
        if record.expires_at >= Utc::now() {
            return Ok(());
        }

        info!(
            key = %key,
            owner = %record.owner,
            expired_at = %record.expires_at,
            "cleaning up expired migration lock"
        );
        // 409 means another instance already reclaimed it; that is fine.
        let _ = self
            .hot
            .delete_doc(LOCK_INDEX, key, Some((doc.seq_no, doc.primary_term)))
            .await;
        Ok(())
    }
}

#[async_trait]
impl DistLock for HotStoreLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> BridgeResult<bool> {
        if let Err(err) = self.cleanup_expired(key).await {
            debug!(key = %key, error = %err, "lock cleanup failed (non-fatal)");
        }

        match self.try_create(key, ttl).await {
            Err(err) if err.is_not_found() => {
                // Lock index doesn't exist yet; create it and retry once.
                self.hot.create_coordination_index(LOCK_INDEX, None).await?;
                self.try_create(key, ttl).await
            }
            other => other,
        }
    }

    async fn release(&self, key: &str) -> BridgeResult<()> {
        match self.hot.delete_doc(LOCK_INDEX, key, None).await {
            Ok(()) => Ok(()),
            // Already released or expired.
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// No-op lock for deployments where only one migrator can run.
pub struct NoopLock;

#[async_trait]
impl DistLock for NoopLock {
    async fn acquire(&self, _key: &str, _ttl: Duration) -> BridgeResult<bool> {
        Ok(true)
    }

    async fn release(&self, _key: &str) -> BridgeResult<()> {
        Ok(())
    }
}
