//! Document transformation between the tiers.
//!
//! Only the inner `_source` object crosses to the cold store; scroll
//! metadata (index, id, score) is discarded.

use oqbridge_core::{BridgeError, BridgeResult};
use serde_json::Value;

/// Extracts the `_source` object from a scroll hit.
pub fn extract_source(hit: &Value) -> BridgeResult<Value> {
    hit.get("_source")
        .cloned()
        .ok_or_else(|| BridgeError::internal("hit missing _source field"))
}

/// Transforms a batch of scroll hits into clean documents for cold ingest.
pub fn transform_batch(hits: &[Value]) -> BridgeResult<Vec<Value>> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            extract_source(hit)
                .map_err(|e| BridgeError::internal(format!("transforming hit {i}: {e}")))
        })
        .collect()
}
