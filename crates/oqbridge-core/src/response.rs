//! Uniform search wire shapes shared by both backends.
//!
//! Hot-store and cold-store search responses both decode into
//! [`SearchResponse`]; merged responses produced by the proxy conform to the
//! same shape. Hit payloads are kept as opaque JSON so unknown fields
//! round-trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A search response from either backend, or a merged cross-tier response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query execution time in milliseconds.
    #[serde(default)]
    pub took: i64,

    /// Whether the query timed out on the backend.
    #[serde(default)]
    pub timed_out: bool,

    /// Shard bookkeeping, passed through opaquely.
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<Value>,

    /// The hits envelope.
    pub hits: HitsEnvelope,

    /// Aggregation results, kept raw for pass-through merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

/// The `hits` object of a search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitsEnvelope {
    /// Total hit count and its exactness relation.
    pub total: TotalHits,

    /// Highest score across the returned hits, null when there are none.
    #[serde(default)]
    pub max_score: Option<f64>,

    /// The hit documents, opaque to the bridge.
    #[serde(default)]
    pub hits: Vec<Value>,
}

/// Total hit count with its relation (`eq` for exact, `gte` for lower bound).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalHits {
    /// The count value.
    pub value: i64,
    /// `"eq"` or `"gte"`.
    #[serde(default = "default_relation")]
    pub relation: String,
}

fn default_relation() -> String {
    "eq".to_string()
}

impl TotalHits {
    /// An exact total of `value`.
    #[must_use]
    pub fn exact(value: i64) -> Self {
        Self {
            value,
            relation: "eq".to_string(),
        }
    }
}

/// One page of a scroll read from the hot store.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    /// Scroll context id for the next continuation call.
    pub scroll_id: String,
    /// Hit documents in this page.
    pub hits: Vec<Value>,
    /// Total documents matched by the scroll query.
    pub total: i64,
}

/// Reads the `_score` of an opaque hit, treating a missing or non-numeric
/// score as 0 so unscored hits sort last in descending order.
#[must_use]
pub fn hit_score(hit: &Value) -> f64 {
    hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0)
}
