//! End-to-end dispatch tests over the axum router with scripted backends.
//!
//! The hot and cold stores are in-memory fakes; the reverse-proxy target is
//! a real mock HTTP server so passthrough behavior is observed on the wire.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, SecondsFormat, Utc};
use oqbridge_backend::{ColdStore, DocEnvelope, HotStore, PutDocOptions, ScrollSlice};
use oqbridge_core::config::{
    BackendConfig, Config, LoggingConfig, MigrationConfig, RetentionConfig, ServerConfig, TlsConfig,
};
use oqbridge_core::{BridgeError, BridgeResult, HitsEnvelope, ScrollPage, SearchResponse, TotalHits};
use oqbridge_proxy::passthrough::Passthrough;
use oqbridge_proxy::state::AppState;
use oqbridge_proxy::build_router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VALID_AUTH: &str = "Basic dXNlcjpwYXNz";

/// Scripted outcome for a fake backend call.
#[derive(Clone)]
enum Scripted {
    Respond(SearchResponse),
    Fail(u16),
    Unscripted,
}

impl Scripted {
    fn into_result(self, url: &str) -> BridgeResult<SearchResponse> {
        match self {
            Self::Respond(resp) => Ok(resp),
            Self::Fail(status) => Err(BridgeError::status(status, url, "scripted failure")),
            Self::Unscripted => Err(BridgeError::internal(format!("unscripted call to {url}"))),
        }
    }
}

fn response_with_scores(scores: &[f64], total: i64) -> SearchResponse {
    SearchResponse {
        took: 5,
        timed_out: false,
        shards: None,
        hits: HitsEnvelope {
            total: TotalHits::exact(total),
            max_score: scores.iter().copied().fold(None, |acc: Option<f64>, s| {
                Some(acc.map_or(s, |m| m.max(s)))
            }),
            hits: scores
                .iter()
                .map(|s| json!({"_score": s, "_source": {"score": s}}))
                .collect(),
        },
        aggregations: None,
    }
}

#[derive(Default)]
struct ScriptedHot {
    search: Mutex<Option<Scripted>>,
    search_raw: Mutex<Option<Scripted>>,
    auth_status: Mutex<Option<u16>>,
    search_calls: Mutex<Vec<(String, Value, String)>>,
    search_raw_calls: Mutex<Vec<(String, Value)>>,
    authenticate_calls: AtomicUsize,
}

impl ScriptedHot {
    fn new() -> Self {
        Self::default()
    }

    fn script_search(&self, outcome: Scripted) {
        *self.search.lock() = Some(outcome);
    }

    fn script_search_raw(&self, outcome: Scripted) {
        *self.search_raw.lock() = Some(outcome);
    }

    fn reject_auth(&self, status: u16) {
        *self.auth_status.lock() = Some(status);
    }
}

#[async_trait]
impl HotStore for ScriptedHot {
    async fn search(
        &self,
        index: &str,
        body: &[u8],
        auth_header: Option<&str>,
    ) -> BridgeResult<SearchResponse> {
        self.search_calls.lock().push((
            index.to_string(),
            serde_json::from_slice(body).unwrap_or(Value::Null),
            auth_header.unwrap_or_default().to_string(),
        ));
        let outcome = self.search.lock().clone().unwrap_or(Scripted::Unscripted);
        outcome.into_result("fake://hot/_search")
    }

    async fn search_raw(
        &self,
        path_and_query: &str,
        body: &[u8],
        _auth_header: &str,
    ) -> BridgeResult<SearchResponse> {
        self.search_raw_calls.lock().push((
            path_and_query.to_string(),
            serde_json::from_slice(body).unwrap_or(Value::Null),
        ));
        let outcome = self.search_raw.lock().clone().unwrap_or(Scripted::Unscripted);
        outcome.into_result("fake://hot/search_raw")
    }

    async fn authenticate(&self, _auth_header: &str) -> BridgeResult<()> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        match *self.auth_status.lock() {
            None => Ok(()),
            Some(status) => Err(BridgeError::status(status, "fake://hot/authinfo", "denied")),
        }
    }

    async fn scroll_start(
        &self,
        _index: &str,
        _body: &[u8],
        _slice: Option<ScrollSlice>,
        _keep_alive: &str,
    ) -> BridgeResult<ScrollPage> {
        Err(BridgeError::internal("not used by the proxy"))
    }

    async fn scroll_next(&self, _scroll_id: &str, _keep_alive: &str) -> BridgeResult<ScrollPage> {
        Err(BridgeError::internal("not used by the proxy"))
    }

    async fn clear_scroll(&self, _scroll_id: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn delete_by_query(&self, _index: &str, _body: &[u8]) -> BridgeResult<()> {
        Err(BridgeError::internal("not used by the proxy"))
    }

    async fn resolve_indices(&self, _pattern: &str) -> BridgeResult<Vec<String>> {
        Err(BridgeError::internal("not used by the proxy"))
    }

    async fn get_doc(&self, _index: &str, _id: &str) -> BridgeResult<Option<DocEnvelope>> {
        Ok(None)
    }

    async fn put_doc(
        &self,
        _index: &str,
        _id: &str,
        _body: &Value,
        _opts: PutDocOptions,
    ) -> BridgeResult<()> {
        Ok(())
    }

    async fn delete_doc(
        &self,
        _index: &str,
        _id: &str,
        _concurrency: Option<(i64, i64)>,
    ) -> BridgeResult<()> {
        Ok(())
    }

    async fn create_coordination_index(
        &self,
        _index: &str,
        _mappings: Option<&Value>,
    ) -> BridgeResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedCold {
    responses: Mutex<HashMap<String, Scripted>>,
    indices: Mutex<Vec<String>>,
    search_calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedCold {
    fn new() -> Self {
        Self::default()
    }

    fn script_index(&self, index: &str, outcome: Scripted) {
        self.responses.lock().insert(index.to_string(), outcome);
    }

    fn set_indices(&self, indices: &[&str]) {
        *self.indices.lock() = indices.iter().map(ToString::to_string).collect();
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.search_calls.lock().clone()
    }
}

#[async_trait]
impl ColdStore for ScriptedCold {
    async fn search(&self, index: &str, body: &[u8]) -> BridgeResult<SearchResponse> {
        self.search_calls.lock().push((
            index.to_string(),
            serde_json::from_slice(body).unwrap_or(Value::Null),
        ));
        let outcome = self
            .responses
            .lock()
            .get(index)
            .cloned()
            .unwrap_or(Scripted::Unscripted);
        outcome.into_result(&format!("fake://cold/{index}/search"))
    }

    async fn bulk_ingest(&self, _index: &str, _docs: &[Value]) -> BridgeResult<()> {
        Err(BridgeError::internal("not used by the proxy"))
    }

    async fn index_exists(&self, _index: &str) -> BridgeResult<bool> {
        Ok(true)
    }

    async fn list_indices(&self) -> BridgeResult<Vec<String>> {
        Ok(self.indices.lock().clone())
    }

    async fn create_index(
        &self,
        _index: &str,
        _timestamp_field: &str,
        _retention_days: i64,
    ) -> BridgeResult<()> {
        Ok(())
    }
}

struct Harness {
    hot: Arc<ScriptedHot>,
    cold: Arc<ScriptedCold>,
    hot_upstream: MockServer,
    app: axum::Router,
}

async fn harness() -> Harness {
    let hot_upstream = MockServer::start().await;
    let cfg = Arc::new(Config {
        server: ServerConfig::default(),
        hot_store: BackendConfig {
            url: hot_upstream.uri(),
            username: String::new(),
            password: String::new(),
            tls: TlsConfig::default(),
        },
        cold_store: BackendConfig {
            url: "http://cold:7280".to_string(),
            username: String::new(),
            password: String::new(),
            tls: TlsConfig::default(),
        },
        retention: RetentionConfig::default(),
        migration: MigrationConfig::default(),
        logging: LoggingConfig::default(),
    });

    let hot = Arc::new(ScriptedHot::new());
    let cold = Arc::new(ScriptedCold::new());
    let passthrough = Arc::new(Passthrough::new(hot_upstream.uri(), reqwest::Client::new()));
    let state = AppState::new(cfg, hot.clone(), cold.clone(), passthrough);

    Harness {
        hot,
        cold,
        hot_upstream,
        app: build_router(state),
    }
}

fn rfc3339(t: chrono::DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn range_body(from: chrono::DateTime<Utc>, to: chrono::DateTime<Utc>) -> Value {
    json!({"query": {"range": {"@timestamp": {"gte": rfc3339(from), "lte": rfc3339(to)}}}})
}

fn hot_window_body() -> Value {
    range_body(Utc::now() - Duration::hours(1), Utc::now())
}

fn cold_window_body() -> Value {
    range_body(
        Utc::now() - Duration::days(90),
        Utc::now() - Duration::days(60),
    )
}

fn straddle_body() -> Value {
    range_body(Utc::now() - Duration::days(60), Utc::now())
}

fn post(uri: &str, body: Value, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoints_need_no_auth() {
    let h = harness().await;
    for uri in ["/health", "/_health"] {
        let response = h
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({"status": "ok", "service": "oqbridge"}));
    }
}

#[tokio::test]
async fn test_hot_window_routes_through_reverse_proxy_once() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/logs/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 1, "timed_out": false,
            "hits": {"total": {"value": 7, "relation": "eq"}, "max_score": null, "hits": []}
        })))
        .expect(1)
        .mount(&h.hot_upstream)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", hot_window_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["hits"]["total"]["value"], json!(7));
    assert!(h.cold.calls().is_empty(), "hot-only must not touch the cold store");
    assert_eq!(h.hot.authenticate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cold_only_with_valid_auth() {
    let h = harness().await;
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[0.8], 1)));

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", cold_window_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["hits"]["total"]["value"], json!(1));
    assert_eq!(h.hot.authenticate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cold_only_without_header_is_401_and_touches_nothing() {
    let h = harness().await;
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[0.8], 1)));

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", cold_window_body(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("authentication failed"));
    assert!(h.cold.calls().is_empty());
    assert_eq!(h.hot.authenticate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cold_only_auth_rejection_propagates_status() {
    let h = harness().await;
    h.hot.reject_auth(403);
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[0.8], 1)));

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", cold_window_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(h.cold.calls().is_empty(), "no cold access after auth rejection");
}

#[tokio::test]
async fn test_cold_only_indeterminate_auth_is_502() {
    let h = harness().await;
    h.hot.reject_auth(500);

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", cold_window_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(h.cold.calls().is_empty());
}

#[tokio::test]
async fn test_cold_failure_falls_back_to_passthrough() {
    let h = harness().await;
    h.cold.script_index("logs", Scripted::Fail(503));
    Mock::given(method("POST"))
        .and(path("/logs/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 2, "timed_out": false,
            "hits": {"total": {"value": 3, "relation": "eq"}, "max_score": null, "hits": []}
        })))
        .expect(1)
        .mount(&h.hot_upstream)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", cold_window_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["hits"]["total"]["value"], json!(3));
}

#[tokio::test]
async fn test_fanout_auth_failure_leaks_no_cold_data() {
    let h = harness().await;
    h.hot.script_search_raw(Scripted::Fail(401));
    h.hot.reject_auth(401);
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[9.9], 1)));

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", straddle_body(), Some("Basic bad")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body, json!({"error": "authentication failed"}));
}

#[tokio::test]
async fn test_fanout_without_header_is_401() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", straddle_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_fanout_hot_outage_requires_explicit_auth_then_serves_cold() {
    let h = harness().await;
    h.hot.script_search_raw(Scripted::Fail(500));
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[1.5], 2)));

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", straddle_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["hits"]["total"]["value"], json!(2));
    assert_eq!(h.hot.authenticate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fanout_both_legs_failing_is_502() {
    let h = harness().await;
    h.hot.script_search_raw(Scripted::Fail(500));
    h.cold.script_index("logs", Scripted::Fail(503));

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", straddle_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("both backends failed"));
}

#[tokio::test]
async fn test_fanout_pagination_rewrite_and_merge() {
    let h = harness().await;
    h.hot
        .script_search_raw(Scripted::Respond(response_with_scores(&[2.0, 1.0], 2)));
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[3.0, 0.0], 2)));

    let mut body = straddle_body();
    body["from"] = json!(1);
    body["size"] = json!(1);

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", body, Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let merged = body_json(response).await;
    // Merged top-4 descending is [3, 2, 1, 0]; page [from=1, size=1] is [2].
    assert_eq!(merged["hits"]["hits"].as_array().unwrap().len(), 1);
    assert_eq!(merged["hits"]["hits"][0]["_score"], json!(2.0));
    assert_eq!(merged["hits"]["total"]["value"], json!(4));

    // Both backends saw the need-to-fetch rewrite.
    let raw_calls = h.hot.search_raw_calls.lock();
    assert_eq!(raw_calls[0].1["from"], json!(0));
    assert_eq!(raw_calls[0].1["size"], json!(2));
    let cold_calls = h.cold.calls();
    assert_eq!(cold_calls[0].1["from"], json!(0));
    assert_eq!(cold_calls[0].1["size"], json!(2));
}

#[tokio::test]
async fn test_planner_rejects_field_sort_for_cross_tier() {
    let h = harness().await;
    let mut body = straddle_body();
    body["sort"] = json!([{"@timestamp": "desc"}]);

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", body, Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("non-score sort"));
}

#[tokio::test]
async fn test_wildcard_cold_fanout_resolves_and_merges() {
    let h = harness().await;
    h.cold.set_indices(&["logs-2023.01", "logs-2023.02", "metrics-old"]);
    h.cold.script_index(
        "logs-2023.01",
        Scripted::Respond(response_with_scores(&[2.0], 1)),
    );
    h.cold.script_index(
        "logs-2023.02",
        Scripted::Respond(response_with_scores(&[1.0], 1)),
    );

    let response = h
        .app
        .clone()
        .oneshot(post("/logs-*/_search", cold_window_body(), Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["hits"]["total"]["value"], json!(2));

    let touched: Vec<String> = h.cold.calls().into_iter().map(|(index, _)| index).collect();
    assert_eq!(touched, vec!["logs-2023.01", "logs-2023.02"]);
}

#[tokio::test]
async fn test_internal_and_root_paths_pass_through() {
    let h = harness().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(3)
        .mount(&h.hot_upstream)
        .await;

    for uri in ["/_search", "/.kibana/_search", "/logs/_mapping"] {
        let response = h
            .app
            .clone()
            .oneshot(post(uri, cold_window_body(), Some(VALID_AUTH)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri} must pass through");
    }
    assert!(h.cold.calls().is_empty());
}

fn msearch_request(uri: &str, lines: &[Value], auth: Option<&str>) -> Request<Body> {
    let body = lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-ndjson");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_msearch_mixed_tiers_in_input_order() {
    let h = harness().await;
    h.hot
        .script_search(Scripted::Respond(response_with_scores(&[5.0], 1)));
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[0.5], 1)));

    let response = h
        .app
        .clone()
        .oneshot(msearch_request(
            "/logs/_msearch",
            &[
                json!({}),
                hot_window_body(),
                json!({}),
                cold_window_body(),
            ],
            Some(VALID_AUTH),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let responses = body["responses"].as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["hits"]["hits"][0]["_score"], json!(5.0));
    assert_eq!(responses[1]["hits"]["hits"][0]["_score"], json!(0.5));
    // One up-front auth check covers the whole batch.
    assert_eq!(h.hot.authenticate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_msearch_header_index_overrides_url_default() {
    let h = harness().await;
    h.cold
        .script_index("archive", Scripted::Respond(response_with_scores(&[0.5], 1)));

    let response = h
        .app
        .clone()
        .oneshot(msearch_request(
            "/logs/_msearch",
            &[json!({"index": "archive"}), cold_window_body()],
            Some(VALID_AUTH),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let touched: Vec<String> = h.cold.calls().into_iter().map(|(index, _)| index).collect();
    assert_eq!(touched, vec!["archive"]);
}

#[tokio::test]
async fn test_msearch_requires_auth_when_any_entry_is_cold() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(msearch_request(
            "/logs/_msearch",
            &[json!({}), cold_window_body()],
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.cold.calls().is_empty());
}

#[tokio::test]
async fn test_msearch_failed_entry_stays_in_position() {
    let h = harness().await;
    h.hot
        .script_search(Scripted::Respond(response_with_scores(&[5.0], 1)));
    h.cold.script_index("logs", Scripted::Fail(503));

    let response = h
        .app
        .clone()
        .oneshot(msearch_request(
            "/logs/_msearch",
            &[
                json!({}),
                cold_window_body(),
                json!({}),
                hot_window_body(),
            ],
            Some(VALID_AUTH),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let responses = body["responses"].as_array().unwrap();
    assert_eq!(responses[0]["status"], json!(502));
    assert!(responses[0]["error"]["reason"].is_string());
    assert_eq!(responses[1]["hits"]["hits"][0]["_score"], json!(5.0));
}

#[tokio::test]
async fn test_msearch_internal_entry_sends_whole_batch_to_passthrough() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/logs/_msearch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": []})))
        .expect(1)
        .mount(&h.hot_upstream)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(msearch_request(
            "/logs/_msearch",
            &[json!({"index": ".system"}), hot_window_body()],
            Some(VALID_AUTH),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.cold.calls().is_empty());
}

#[tokio::test]
async fn test_msearch_odd_line_count_is_rejected() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(msearch_request(
            "/logs/_msearch",
            &[json!({}), hot_window_body(), json!({})],
            Some(VALID_AUTH),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_size_zero_returns_no_hits() {
    let h = harness().await;
    h.hot
        .script_search_raw(Scripted::Respond(response_with_scores(&[], 10)));
    h.cold
        .script_index("logs", Scripted::Respond(response_with_scores(&[], 4)));

    let mut body = straddle_body();
    body["size"] = json!(0);

    let response = h
        .app
        .clone()
        .oneshot(post("/logs/_search", body, Some(VALID_AUTH)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let merged = body_json(response).await;
    assert_eq!(merged["hits"]["hits"], json!([]));
    assert_eq!(merged["hits"]["total"]["value"], json!(14));
    assert_eq!(merged["hits"]["max_score"], Value::Null);

    let raw_calls = h.hot.search_raw_calls.lock();
    assert_eq!(raw_calls[0].1["size"], json!(0));
}
