//! Cold-store HTTP client.
//!
//! The cold store exposes a REST API under `/api/v1`: per-index search and
//! NDJSON ingest, plus index management. Ingest payloads can be gzip
//! compressed and, for large batches, staged through temp files on disk
//! instead of memory.

use crate::http::{build_client, read_success};
use crate::traits::ColdStore;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use oqbridge_core::config::BackendConfig;
use oqbridge_core::{BridgeError, BridgeResult, SearchResponse};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

/// Concrete cold-store client over HTTP.
pub struct ColdStoreClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
    compress: bool,
    temp_dir: Option<PathBuf>,
}

impl ColdStoreClient {
    /// Creates a client with an explicit reqwest client.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        compress: bool,
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
            compress,
            temp_dir: None,
        }
    }

    /// Creates a client from backend configuration.
    pub fn from_config(cfg: &BackendConfig, compress: bool) -> BridgeResult<Self> {
        let client = build_client(&cfg.tls)?;
        Ok(Self::new(
            cfg.url.clone(),
            cfg.username.clone(),
            cfg.password.clone(),
            compress,
            client,
        ))
    }

    /// Stages ingest payloads in temp files under `dir` instead of memory,
    /// bounding memory usage for large batches.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.username.is_empty() {
            req
        } else {
            req.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn ingest_in_memory(&self, index: &str, ndjson: Vec<u8>) -> BridgeResult<()> {
        let (payload, encoding) = if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(&ndjson)?;
            (encoder.finish()?, Some("gzip"))
        } else {
            (ndjson, None)
        };
        self.send_ingest(index, reqwest::Body::from(payload), encoding)
            .await
    }

    async fn ingest_via_disk(
        &self,
        index: &str,
        ndjson: Vec<u8>,
        dir: PathBuf,
    ) -> BridgeResult<()> {
        let compress = self.compress;
        // Temp files are removed when their guards drop, on success and on
        // every error path alike.
        let staged = tokio::task::spawn_blocking(move || -> BridgeResult<_> {
            let mut raw_file = tempfile::Builder::new()
                .prefix("oqbridge-ingest-")
                .suffix(".ndjson")
                .tempfile_in(&dir)?;
            raw_file.write_all(&ndjson)?;
            raw_file.flush()?;

            if compress {
                let mut gz_file = tempfile::Builder::new()
                    .prefix("oqbridge-ingest-")
                    .suffix(".ndjson.gz")
                    .tempfile_in(&dir)?;
                let mut encoder = GzEncoder::new(&mut gz_file, Compression::fast());
                let mut reader = std::fs::File::open(raw_file.path())?;
                std::io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?;
                gz_file.flush()?;
                Ok((gz_file, Some("gzip")))
            } else {
                Ok((raw_file, None))
            }
        })
        .await
        .map_err(|e| BridgeError::internal(format!("ingest staging task failed: {e}")))??;

        let (upload_file, encoding) = staged;
        let file = tokio::fs::File::open(upload_file.path()).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let result = self.send_ingest(index, body, encoding).await;
        drop(upload_file);
        result
    }

    async fn send_ingest(
        &self,
        index: &str,
        body: reqwest::Body,
        content_encoding: Option<&str>,
    ) -> BridgeResult<()> {
        let url = format!("{}/api/v1/{}/ingest", self.base_url, index);
        let mut req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        if let Some(encoding) = content_encoding {
            req = req.header(CONTENT_ENCODING, encoding);
        }
        let resp = self.with_auth(req).send().await?;
        read_success(&url, resp).await?;
        Ok(())
    }
}

/// Serializes docs to NDJSON, sending each doc's inner `_source` object when
/// present and the whole doc otherwise.
fn build_ndjson(docs: &[Value]) -> BridgeResult<Vec<u8>> {
    let mut out = Vec::new();
    for doc in docs {
        let payload = doc.get("_source").unwrap_or(doc);
        serde_json::to_writer(&mut out, payload)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[derive(Deserialize)]
struct IndexListEntry {
    #[serde(default)]
    index_config: IndexConfigEntry,
}

#[derive(Deserialize, Default)]
struct IndexConfigEntry {
    #[serde(default)]
    index_id: String,
}

#[async_trait]
impl ColdStore for ColdStoreClient {
    async fn search(&self, index: &str, body: &[u8]) -> BridgeResult<SearchResponse> {
        let url = format!("{}/api/v1/{}/search", self.base_url, index);
        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        let resp = self.with_auth(req).send().await?;
        let raw = read_success(&url, resp).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn bulk_ingest(&self, index: &str, docs: &[Value]) -> BridgeResult<()> {
        let ndjson = build_ndjson(docs)?;
        match &self.temp_dir {
            Some(dir) => self.ingest_via_disk(index, ndjson, dir.clone()).await,
            None => self.ingest_in_memory(index, ndjson).await,
        }
    }

    async fn index_exists(&self, index: &str) -> BridgeResult<bool> {
        let url = format!("{}/api/v1/indexes/{}", self.base_url, index);
        let resp = self.with_auth(self.client.get(&url)).send().await?;
        match read_success(&url, resp).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_indices(&self) -> BridgeResult<Vec<String>> {
        let url = format!("{}/api/v1/indexes", self.base_url);
        let resp = self.with_auth(self.client.get(&url)).send().await?;
        let raw = read_success(&url, resp).await?;
        let entries: Vec<IndexListEntry> = serde_json::from_slice(&raw)?;
        Ok(entries
            .into_iter()
            .map(|e| e.index_config.index_id)
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn create_index(
        &self,
        index: &str,
        timestamp_field: &str,
        retention_days: i64,
    ) -> BridgeResult<()> {
        let mut config = json!({
            "version": "0.8",
            "index_id": index,
            "doc_mapping": {
                "mode": "dynamic",
                "timestamp_field": timestamp_field,
                "field_mappings": [
                    {
                        "name": timestamp_field,
                        "type": "datetime",
                        "input_formats": ["rfc3339", "unix_timestamp"],
                        "output_format": "rfc3339",
                        "fast": true
                    }
                ]
            },
            "indexing_settings": {
                "commit_timeout_secs": 60
            }
        });

        if retention_days > 0 {
            config["retention"] = json!({
                "period": format!("{retention_days} days"),
                "schedule": "daily"
            });
        }

        let url = format!("{}/api/v1/indexes", self.base_url);
        let req = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&config);
        let resp = self.with_auth(req).send().await?;
        read_success(&url, resp).await?;
        Ok(())
    }
}
