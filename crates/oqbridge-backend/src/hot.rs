//! Hot-store HTTP client.
//!
//! Speaks the hot store's native API: `_search` (plain, raw, and scrolled),
//! the security plugin's `authinfo` endpoint for credential validation,
//! `_delete_by_query`, `_cat/indices` for wildcard resolution, and document
//! CRUD for the coordination indices (locks, checkpoints, watermarks,
//! metrics).

use crate::http::{build_client, read_success};
use crate::traits::{DocEnvelope, HotStore, PutDocOptions, ScrollSlice};
use async_trait::async_trait;
use oqbridge_core::config::BackendConfig;
use oqbridge_core::{BridgeError, BridgeResult, HitsEnvelope, ScrollPage, SearchResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

/// Concrete hot-store client over HTTP.
pub struct HotStoreClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl HotStoreClient {
    /// Creates a client with an explicit reqwest client (e.g. one built with
    /// custom TLS settings).
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            client,
        }
    }

    /// Creates a client from backend configuration, building the HTTP client
    /// from the configured TLS settings.
    pub fn from_config(cfg: &BackendConfig) -> BridgeResult<Self> {
        let client = build_client(&cfg.tls)?;
        Ok(Self::new(
            cfg.url.clone(),
            cfg.username.clone(),
            cfg.password.clone(),
            client,
        ))
    }

    // `Some(header)` forwards the client's credentials (an empty header sends
    // none at all); `None` means an internal call under the service account.
    // Client-facing calls must never fall back to the service account.
    fn with_auth(
        &self,
        req: reqwest::RequestBuilder,
        auth_header: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match auth_header {
            None => self.with_service_account(req),
            Some("") => req,
            Some(header) => req.header(AUTHORIZATION, header),
        }
    }

    fn with_service_account(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.username.is_empty() {
            req
        } else {
            req.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn decode_search(&self, url: &str, resp: reqwest::Response) -> BridgeResult<SearchResponse> {
        let body = read_success(url, resp).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[derive(Deserialize)]
struct ScrollEnvelope {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: String,
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct CatIndexEntry {
    index: String,
}

#[derive(Deserialize)]
struct GetDocEnvelope {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Value>,
    #[serde(rename = "_seq_no", default)]
    seq_no: i64,
    #[serde(rename = "_primary_term", default)]
    primary_term: i64,
}

#[async_trait]
impl HotStore for HotStoreClient {
    async fn search(
        &self,
        index: &str,
        body: &[u8],
        auth_header: Option<&str>,
    ) -> BridgeResult<SearchResponse> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        let resp = self.with_auth(req, auth_header).send().await?;
        self.decode_search(&url, resp).await
    }

    async fn search_raw(
        &self,
        path_and_query: &str,
        body: &[u8],
        auth_header: &str,
    ) -> BridgeResult<SearchResponse> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        let resp = self.with_auth(req, Some(auth_header)).send().await?;
        self.decode_search(&url, resp).await
    }

    async fn authenticate(&self, auth_header: &str) -> BridgeResult<()> {
        let url = format!("{}/_plugins/_security/authinfo", self.base_url);
        let mut req = self.client.get(&url);
        if !auth_header.is_empty() {
            req = req.header(AUTHORIZATION, auth_header);
        }
        let resp = req.send().await?;
        read_success(&url, resp).await?;
        Ok(())
    }

    async fn scroll_start(
        &self,
        index: &str,
        body: &[u8],
        slice: Option<ScrollSlice>,
        keep_alive: &str,
    ) -> BridgeResult<ScrollPage> {
        let url = format!("{}/{}/_search?scroll={}", self.base_url, index, keep_alive);

        // Inject slice parameters into the query body for parallel reads.
        let req_body = match slice {
            Some(s) if s.max > 1 => {
                let mut query: Value = serde_json::from_slice(body)?;
                let map = query.as_object_mut().ok_or_else(|| {
                    BridgeError::internal("scroll query body must be a JSON object")
                })?;
                map.insert("slice".to_string(), json!({"id": s.id, "max": s.max}));
                serde_json::to_vec(&query)?
            }
            _ => body.to_vec(),
        };

        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(req_body);
        let resp = self.with_service_account(req).send().await?;
        let raw = read_success(&url, resp).await?;
        let envelope: ScrollEnvelope = serde_json::from_slice(&raw)?;
        Ok(ScrollPage {
            scroll_id: envelope.scroll_id,
            total: envelope.hits.total.value,
            hits: envelope.hits.hits,
        })
    }

    async fn scroll_next(&self, scroll_id: &str, keep_alive: &str) -> BridgeResult<ScrollPage> {
        let url = format!("{}/_search/scroll", self.base_url);
        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({"scroll": keep_alive, "scroll_id": scroll_id}));
        let resp = self.with_service_account(req).send().await?;
        let raw = read_success(&url, resp).await?;
        let envelope: ScrollEnvelope = serde_json::from_slice(&raw)?;
        Ok(ScrollPage {
            scroll_id: envelope.scroll_id,
            total: envelope.hits.total.value,
            hits: envelope.hits.hits,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> BridgeResult<()> {
        let url = format!("{}/_search/scroll", self.base_url);
        let req = self
            .client
            .delete(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({"scroll_id": scroll_id}));
        // Best-effort release; a failure status is not worth surfacing.
        let _ = self.with_service_account(req).send().await?;
        Ok(())
    }

    async fn delete_by_query(&self, index: &str, body: &[u8]) -> BridgeResult<()> {
        let url = format!("{}/{}/_delete_by_query", self.base_url, index);
        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        let resp = self.with_service_account(req).send().await?;
        read_success(&url, resp).await?;
        Ok(())
    }

    async fn resolve_indices(&self, pattern: &str) -> BridgeResult<Vec<String>> {
        let url = format!("{}/_cat/indices/{}?format=json", self.base_url, pattern);
        let resp = self.with_service_account(self.client.get(&url)).send().await?;
        let raw = read_success(&url, resp).await?;
        let entries: Vec<CatIndexEntry> = serde_json::from_slice(&raw)?;
        Ok(entries
            .into_iter()
            .map(|e| e.index)
            .filter(|name| !name.starts_with('.'))
            .collect())
    }

    async fn get_doc(&self, index: &str, id: &str) -> BridgeResult<Option<DocEnvelope>> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let resp = self.with_service_account(self.client.get(&url)).send().await?;
        let raw = match read_success(&url, resp).await {
            Ok(raw) => raw,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let envelope: GetDocEnvelope = serde_json::from_slice(&raw)?;
        if !envelope.found {
            return Ok(None);
        }
        Ok(Some(DocEnvelope {
            source: envelope.source.unwrap_or(Value::Null),
            seq_no: envelope.seq_no,
            primary_term: envelope.primary_term,
        }))
    }

    async fn put_doc(
        &self,
        index: &str,
        id: &str,
        body: &Value,
        opts: PutDocOptions,
    ) -> BridgeResult<()> {
        let mut url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let mut params = Vec::new();
        if opts.create_only {
            params.push("op_type=create");
        }
        if opts.refresh {
            params.push("refresh=true");
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }

        let req = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        let resp = self.with_service_account(req).send().await?;
        read_success(&url, resp).await?;
        Ok(())
    }

    async fn delete_doc(
        &self,
        index: &str,
        id: &str,
        concurrency: Option<(i64, i64)>,
    ) -> BridgeResult<()> {
        let url = match concurrency {
            Some((seq_no, primary_term)) => format!(
                "{}/{}/_doc/{}?if_seq_no={}&if_primary_term={}&refresh=true",
                self.base_url, index, id, seq_no, primary_term
            ),
            None => format!("{}/{}/_doc/{}?refresh=true", self.base_url, index, id),
        };
        let resp = self.with_service_account(self.client.delete(&url)).send().await?;
        read_success(&url, resp).await?;
        Ok(())
    }

    async fn create_coordination_index(
        &self,
        index: &str,
        mappings: Option<&Value>,
    ) -> BridgeResult<()> {
        let url = format!("{}/{}", self.base_url, index);
        let mut body = json!({
            "settings": {"number_of_shards": 1, "number_of_replicas": 1}
        });
        if let Some(mappings) = mappings {
            body["mappings"] = mappings.clone();
        }

        let req = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        let resp = self.with_service_account(req).send().await?;
        match read_success(&url, resp).await {
            Ok(_) => Ok(()),
            // Another instance may have created it concurrently.
            Err(BridgeError::Status { status: 400, body, .. })
                if body.contains("resource_already_exists_exception") =>
            {
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
