//! In-memory fakes of the backend traits for driver and store tests.

use async_trait::async_trait;
use oqbridge_backend::{ColdStore, DocEnvelope, HotStore, PutDocOptions, ScrollSlice};
use oqbridge_core::{BridgeError, BridgeResult, ScrollPage, SearchResponse};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

#[derive(Clone)]
pub struct StoredDoc {
    pub source: Value,
    pub seq_no: i64,
    pub primary_term: i64,
}

/// Hot-store fake: document CRUD over a hash map with atomic-create and
/// optimistic-concurrency semantics, plus scripted sliced-scroll pages.
#[derive(Default)]
pub struct FakeHotStore {
    pub docs: Mutex<HashMap<(String, String), StoredDoc>>,
    pub indices: Mutex<HashSet<String>>,
    seq: AtomicI64,
    /// Pages served per slice id, consumed in order.
    pub slice_pages: Mutex<HashMap<usize, VecDeque<Vec<Value>>>>,
    scroll_cursors: Mutex<HashMap<String, usize>>,
    pub scrolls_started: Mutex<Vec<usize>>,
    pub scroll_bodies: Mutex<Vec<Value>>,
    pub cleared_scrolls: Mutex<Vec<String>>,
    pub delete_queries: Mutex<Vec<(String, Value)>>,
    pub resolutions: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeHotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(self, index: &str) -> Self {
        self.indices.lock().insert(index.to_string());
        self
    }

    pub fn add_slice_pages(&self, slice_id: usize, pages: Vec<Vec<Value>>) {
        self.slice_pages
            .lock()
            .insert(slice_id, pages.into_iter().collect());
    }

    pub fn doc_source(&self, index: &str, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .get(&(index.to_string(), id.to_string()))
            .map(|d| d.source.clone())
    }
}

#[async_trait]
impl HotStore for FakeHotStore {
    async fn search(
        &self,
        _index: &str,
        _body: &[u8],
        _auth_header: Option<&str>,
    ) -> BridgeResult<SearchResponse> {
        Err(BridgeError::internal("search not scripted in FakeHotStore"))
    }

    async fn search_raw(
        &self,
        _path_and_query: &str,
        _body: &[u8],
        _auth_header: &str,
    ) -> BridgeResult<SearchResponse> {
        Err(BridgeError::internal("search_raw not scripted in FakeHotStore"))
    }

    async fn authenticate(&self, _auth_header: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn scroll_start(
        &self,
        _index: &str,
        body: &[u8],
        slice: Option<ScrollSlice>,
        _keep_alive: &str,
    ) -> BridgeResult<ScrollPage> {
        let slice_id = slice.map_or(0, |s| s.id);
        self.scrolls_started.lock().push(slice_id);
        self.scroll_bodies
            .lock()
            .push(serde_json::from_slice(body)?);

        let mut pages = self.slice_pages.lock();
        let queue = pages.entry(slice_id).or_default();
        let total: usize = queue.iter().map(Vec::len).sum();
        let first = queue.pop_front().unwrap_or_default();

        let scroll_id = format!("scroll-{slice_id}");
        self.scroll_cursors.lock().insert(scroll_id.clone(), slice_id);
        Ok(ScrollPage {
            scroll_id,
            total: total as i64,
            hits: first,
        })
    }

    async fn scroll_next(&self, scroll_id: &str, _keep_alive: &str) -> BridgeResult<ScrollPage> {
        let slice_id = *self
            .scroll_cursors
            .lock()
            .get(scroll_id)
            .ok_or_else(|| BridgeError::internal("unknown scroll id"))?;
        let next = self
            .slice_pages
            .lock()
            .get_mut(&slice_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(ScrollPage {
            scroll_id: scroll_id.to_string(),
            total: 0,
            hits: next,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> BridgeResult<()> {
        self.cleared_scrolls.lock().push(scroll_id.to_string());
        Ok(())
    }

    async fn delete_by_query(&self, index: &str, body: &[u8]) -> BridgeResult<()> {
        self.delete_queries
            .lock()
            .push((index.to_string(), serde_json::from_slice(body)?));
        Ok(())
    }

    async fn resolve_indices(&self, pattern: &str) -> BridgeResult<Vec<String>> {
        Ok(self
            .resolutions
            .lock()
            .get(pattern)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_doc(&self, index: &str, id: &str) -> BridgeResult<Option<DocEnvelope>> {
        Ok(self
            .docs
            .lock()
            .get(&(index.to_string(), id.to_string()))
            .map(|doc| DocEnvelope {
                source: doc.source.clone(),
                seq_no: doc.seq_no,
                primary_term: doc.primary_term,
            }))
    }

    async fn put_doc(
        &self,
        index: &str,
        id: &str,
        body: &Value,
        opts: PutDocOptions,
    ) -> BridgeResult<()> {
        if !self.indices.lock().contains(index) {
            return Err(BridgeError::status(
                404,
                format!("fake://{index}/_doc/{id}"),
                "index_not_found_exception",
            ));
        }
        let key = (index.to_string(), id.to_string());
        let mut docs = self.docs.lock();
        if opts.create_only && docs.contains_key(&key) {
            return Err(BridgeError::status(
                409,
                format!("fake://{index}/_doc/{id}"),
                "version_conflict_engine_exception",
            ));
        }
        let seq_no = self.seq.fetch_add(1, Ordering::SeqCst);
        docs.insert(
            key,
            StoredDoc {
                source: body.clone(),
                seq_no,
                primary_term: 1,
            },
        );
        Ok(())
    }

    async fn delete_doc(
        &self,
        index: &str,
        id: &str,
        concurrency: Option<(i64, i64)>,
    ) -> BridgeResult<()> {
        let key = (index.to_string(), id.to_string());
        let mut docs = self.docs.lock();
        let Some(existing) = docs.get(&key) else {
            return Err(BridgeError::status(
                404,
                format!("fake://{index}/_doc/{id}"),
                "not_found",
            ));
        };
        if let Some((seq_no, primary_term)) = concurrency {
            if existing.seq_no != seq_no || existing.primary_term != primary_term {
                return Err(BridgeError::status(
                    409,
                    format!("fake://{index}/_doc/{id}"),
                    "version_conflict_engine_exception",
                ));
            }
        }
        docs.remove(&key);
        Ok(())
    }

    async fn create_coordination_index(
        &self,
        index: &str,
        _mappings: Option<&Value>,
    ) -> BridgeResult<()> {
        self.indices.lock().insert(index.to_string());
        Ok(())
    }
}

/// Cold-store fake recording ingests and index management calls.
#[derive(Default)]
pub struct FakeColdStore {
    pub ingested: Mutex<Vec<(String, Vec<Value>)>>,
    pub existing: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<(String, String, i64)>>,
    pub fail_ingest: AtomicBool,
}

impl FakeColdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing_index(self, index: &str) -> Self {
        self.existing.lock().insert(index.to_string());
        self
    }

    pub fn ingested_count(&self) -> usize {
        self.ingested.lock().iter().map(|(_, docs)| docs.len()).sum()
    }
}

#[async_trait]
impl ColdStore for FakeColdStore {
    async fn search(&self, _index: &str, _body: &[u8]) -> BridgeResult<SearchResponse> {
        Err(BridgeError::internal("search not scripted in FakeColdStore"))
    }

    async fn bulk_ingest(&self, index: &str, docs: &[Value]) -> BridgeResult<()> {
        if self.fail_ingest.load(Ordering::SeqCst) {
            return Err(BridgeError::status(503, "fake://ingest", "ingest unavailable"));
        }
        self.ingested
            .lock()
            .push((index.to_string(), docs.to_vec()));
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> BridgeResult<bool> {
        Ok(self.existing.lock().contains(index))
    }

    async fn list_indices(&self) -> BridgeResult<Vec<String>> {
        Ok(self.existing.lock().iter().cloned().collect())
    }

    async fn create_index(
        &self,
        index: &str,
        timestamp_field: &str,
        retention_days: i64,
    ) -> BridgeResult<()> {
        self.created.lock().push((
            index.to_string(),
            timestamp_field.to_string(),
            retention_days,
        ));
        self.existing.lock().insert(index.to_string());
        Ok(())
    }
}
