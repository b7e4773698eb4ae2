//! Capability traits for the two search backends.
//!
//! The proxy handler and the migration driver depend on these traits rather
//! than on the concrete HTTP clients, so tests can substitute in-memory
//! fakes for either store.

use async_trait::async_trait;
use oqbridge_core::{BridgeResult, ScrollPage, SearchResponse};
use serde_json::Value;

/// Slice parameters for a parallel scroll read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSlice {
    /// This slice's id (0-based).
    pub id: usize,
    /// Total number of slices.
    pub max: usize,
}

/// A coordination document read back from the hot store, with the metadata
/// needed for optimistic-concurrency deletes.
#[derive(Debug, Clone)]
pub struct DocEnvelope {
    /// The document source.
    pub source: Value,
    /// Sequence number for conditional operations.
    pub seq_no: i64,
    /// Primary term for conditional operations.
    pub primary_term: i64,
}

/// Options for writing a coordination document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutDocOptions {
    /// Use `op_type=create` so the write fails with 409 if the document
    /// already exists (atomic-create semantics).
    pub create_only: bool,
    /// Refresh the index so the write is immediately visible.
    pub refresh: bool,
}

/// Operations provided by the hot store.
#[async_trait]
pub trait HotStore: Send + Sync {
    /// Executes a search. `Some(header)` forwards the client's credentials
    /// (an empty header sends none, so the hot store sees an anonymous
    /// request); `None` is an internal call under the service account.
    async fn search(
        &self,
        index: &str,
        body: &[u8],
        auth_header: Option<&str>,
    ) -> BridgeResult<SearchResponse>;

    /// Executes a search preserving the client's original path and query
    /// string, always with the client's auth header. Used by the fan-out
    /// hot leg.
    async fn search_raw(
        &self,
        path_and_query: &str,
        body: &[u8],
        auth_header: &str,
    ) -> BridgeResult<SearchResponse>;

    /// Validates credentials against the hot store's security endpoint.
    /// 401/403 surface as typed auth errors; any other failure is
    /// inconclusive and must not authorize cold access.
    async fn authenticate(&self, auth_header: &str) -> BridgeResult<()>;

    /// Starts a scroll read. When `slice.max > 1` the slice parameters are
    /// injected into the query body.
    async fn scroll_start(
        &self,
        index: &str,
        body: &[u8],
        slice: Option<ScrollSlice>,
        keep_alive: &str,
    ) -> BridgeResult<ScrollPage>;

    /// Continues a scroll read.
    async fn scroll_next(&self, scroll_id: &str, keep_alive: &str) -> BridgeResult<ScrollPage>;

    /// Releases server-side scroll resources.
    async fn clear_scroll(&self, scroll_id: &str) -> BridgeResult<()>;

    /// Deletes documents matching the query.
    async fn delete_by_query(&self, index: &str, body: &[u8]) -> BridgeResult<()>;

    /// Expands a wildcard pattern to concrete index names, excluding
    /// system-internal indices.
    async fn resolve_indices(&self, pattern: &str) -> BridgeResult<Vec<String>>;

    /// Reads a coordination document. Returns `None` when absent.
    async fn get_doc(&self, index: &str, id: &str) -> BridgeResult<Option<DocEnvelope>>;

    /// Writes a coordination document.
    async fn put_doc(
        &self,
        index: &str,
        id: &str,
        body: &Value,
        opts: PutDocOptions,
    ) -> BridgeResult<()>;

    /// Deletes a coordination document, optionally guarded by
    /// `(seq_no, primary_term)` optimistic concurrency.
    async fn delete_doc(
        &self,
        index: &str,
        id: &str,
        concurrency: Option<(i64, i64)>,
    ) -> BridgeResult<()>;

    /// Creates a coordination index (1 shard, 1 replica), tolerating
    /// concurrent creation by another instance. `mappings` optionally
    /// declares field types.
    async fn create_coordination_index(
        &self,
        index: &str,
        mappings: Option<&Value>,
    ) -> BridgeResult<()>;
}

/// Operations provided by the cold store.
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Executes a search against one cold index.
    async fn search(&self, index: &str, body: &[u8]) -> BridgeResult<SearchResponse>;

    /// Ingests a batch of documents. Each doc's inner `_source` object is
    /// sent; a doc without `_source` is sent whole.
    async fn bulk_ingest(&self, index: &str, docs: &[Value]) -> BridgeResult<()>;

    /// Checks whether an index exists.
    async fn index_exists(&self, index: &str) -> BridgeResult<bool>;

    /// Lists all index ids.
    async fn list_indices(&self) -> BridgeResult<Vec<String>>;

    /// Creates an index with a dynamic schema, a fast datetime timestamp
    /// field, and an optional retention policy (`retention_days > 0`).
    async fn create_index(
        &self,
        index: &str,
        timestamp_field: &str,
        retention_days: i64,
    ) -> BridgeResult<()>;
}
