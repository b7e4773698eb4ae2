//! Per-request dispatch: endpoint parsing, tier routing, authentication
//! policy, fan-out, and error mapping.
//!
//! Security invariant: cold data is only ever returned after the hot store
//! has vouched for the client's credentials, either implicitly (the hot leg
//! succeeded with the client's header) or explicitly (the `authinfo` check
//! passed). A 401/403 from the hot store is authoritative and always wins.

use crate::endpoint::{parse_endpoint, split_indices, EndpointKind};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::join_all;
use oqbridge_core::{BridgeError, BridgeResult, SearchResponse};
use oqbridge_query::{
    contains_wildcard, has_internal, has_wildcard, matches_pattern, merge, merge_with_options,
    plan_fanout, FanoutPlan, MergeOptions, RouteTarget,
};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

/// Health probe body, served without authentication.
pub async fn health() -> Response {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        r#"{"status":"ok","service":"oqbridge"}"#,
    )
        .into_response()
}

/// Fallback handler for everything that is not a health probe.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().clone();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();

    let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(body) => body,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                json!({"error": "failed to read request body"}),
            )
        }
    };

    let (kind, indices) = parse_endpoint(&path);
    match kind {
        EndpointKind::Search => {
            // Root /_search has no reliable index list for cold fan-out, and
            // system-internal indices belong to the hot store alone.
            if indices.is_empty() || has_internal(&indices) {
                return state.passthrough.forward(method, &path_and_query, &headers, body).await;
            }
            handle_search(state, method, path_and_query, headers, body, indices).await
        }
        EndpointKind::MSearch => {
            if has_internal(&indices) {
                return state.passthrough.forward(method, &path_and_query, &headers, body).await;
            }
            handle_msearch(state, method, path_and_query, headers, body, indices).await
        }
        EndpointKind::Passthrough => {
            state.passthrough.forward(method, &path_and_query, &headers, body).await
        }
    }
}

fn auth_header(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn auth_failed_response(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED);
    error_response(status, json!({"error": "authentication failed"}))
}

fn planner_reject_response(context: &str, err: &BridgeError) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        json!({"error": context, "detail": err.to_string()}),
    )
}

/// Computes the routing decision across all requested indices, each with its
/// own timestamp field. Disagreement between indices falls back to both
/// tiers.
fn route_for_indices(state: &AppState, body: &[u8], indices: &[String]) -> RouteTarget {
    let mut decision = None;
    for index in indices {
        let field = state.cfg.timestamp_field_for(index);
        let target = state.router.route(body, field);
        match decision {
            None => decision = Some(target),
            Some(prev) if prev != target => return RouteTarget::Both,
            Some(_) => {}
        }
    }
    decision.unwrap_or(RouteTarget::Both)
}

/// Validates the client's credentials against the hot store. Returns the
/// ready-made error response on failure so callers can bail directly.
async fn ensure_authenticated(state: &AppState, auth: &str) -> Result<(), Response> {
    if auth.is_empty() {
        // No header at all: reject without touching either backend.
        return Err(auth_failed_response(401));
    }
    match state.hot.authenticate(auth).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_auth_error() => {
            warn!(status = err.auth_status(), "explicit authentication failed");
            Err(auth_failed_response(err.auth_status()))
        }
        Err(err) => {
            // The hot store could not decide; that never authorizes cold access.
            warn!(error = %err, "authentication check inconclusive");
            Err(error_response(
                StatusCode::BAD_GATEWAY,
                json!({"error": "authentication failed"}),
            ))
        }
    }
}

async fn handle_search(
    state: AppState,
    method: Method,
    path_and_query: String,
    headers: HeaderMap,
    body: Bytes,
    indices: Vec<String>,
) -> Response {
    let target = route_for_indices(&state, &body, &indices);
    debug!(indices = %indices.join(","), target = %target, "search routing decision");

    match target {
        RouteTarget::HotOnly => {
            // The hot store validates the client's credentials itself.
            state.passthrough.forward(method, &path_and_query, &headers, body).await
        }

        RouteTarget::ColdOnly => {
            let auth = auth_header(&headers);

            // Single concrete index: no merge semantics required.
            if indices.len() == 1 && !has_wildcard(&indices) {
                if let Err(response) = ensure_authenticated(&state, &auth).await {
                    return response;
                }
                match state.cold.search(&indices[0], &body).await {
                    Ok(resp) => Json(resp).into_response(),
                    Err(err) => {
                        // Last-resort compatibility: let the hot store answer.
                        error!(error = %err, "cold search failed, falling back to passthrough");
                        state.passthrough.forward(method, &path_and_query, &headers, body).await
                    }
                }
            } else {
                let fanout = match plan_fanout(&body) {
                    Ok(fanout) => fanout,
                    Err(err) => {
                        return planner_reject_response("unsupported query for multi-index merge", &err)
                    }
                };
                if let Err(response) = ensure_authenticated(&state, &auth).await {
                    return response;
                }
                match search_cold_indices(&state, &indices, &fanout.body).await {
                    Ok(resp) => {
                        Json(merge_with_options(None, Some(resp), &fanout.merge)).into_response()
                    }
                    Err(err) => {
                        error!(error = %err, "cold search failed, falling back to passthrough");
                        state.passthrough.forward(method, &path_and_query, &headers, body).await
                    }
                }
            }
        }

        RouteTarget::Both => {
            let fanout = match plan_fanout(&body) {
                Ok(fanout) => fanout,
                Err(err) => {
                    return planner_reject_response("unsupported query for cross-tier merge", &err)
                }
            };
            let auth = auth_header(&headers);
            fanout_search(&state, &indices, &path_and_query, fanout, &auth).await
        }
    }
}

/// Runs the hot and cold legs in parallel and composes the response under
/// the no-cold-leakage rule.
async fn fanout_search(
    state: &AppState,
    indices: &[String],
    path_and_query: &str,
    fanout: FanoutPlan,
    auth: &str,
) -> Response {
    if auth.is_empty() {
        return error_response(
            StatusCode::UNAUTHORIZED,
            json!({"error": "authentication required"}),
        );
    }

    let hot_leg = state.hot.search_raw(path_and_query, &fanout.body, auth);
    let cold_leg = search_cold_indices(state, indices, &fanout.body);
    let (hot_result, cold_result) = tokio::join!(hot_leg, cold_leg);

    if let Err(err) = &hot_result {
        error!(error = %err, "hot search failed during fan-out");
    }
    if let Err(err) = &cold_result {
        error!(error = %err, "cold search failed during fan-out");
    }

    // An auth verdict from the hot store is authoritative: no cold data.
    if let Err(err) = &hot_result {
        if err.is_auth_error() {
            return auth_failed_response(err.auth_status());
        }
    }

    // The hot leg failed for other reasons: validate credentials explicitly
    // before serving cold-only results.
    if hot_result.is_err() {
        if let Err(response) = ensure_authenticated(state, auth).await {
            return response;
        }
    }

    match (hot_result, cold_result) {
        (Err(_), Err(_)) => error_response(
            StatusCode::BAD_GATEWAY,
            json!({"error": "both backends failed"}),
        ),
        (hot, cold) => {
            let merged = merge_with_options(hot.ok(), cold.ok(), &fanout.merge);
            Json(merged).into_response()
        }
    }
}

/// Resolves wildcard patterns against the cold store's index list,
/// preserving order and deduplicating.
async fn resolve_cold_indices(state: &AppState, indices: &[String]) -> BridgeResult<Vec<String>> {
    if !has_wildcard(indices) {
        return Ok(indices.to_vec());
    }
    let all = state.cold.list_indices().await?;
    let mut seen = std::collections::HashSet::new();
    let mut resolved = Vec::new();
    for index in indices {
        if !contains_wildcard(index) {
            if seen.insert(index.clone()) {
                resolved.push(index.clone());
            }
            continue;
        }
        for name in &all {
            if !seen.contains(name) && matches_pattern(index, name) {
                seen.insert(name.clone());
                resolved.push(name.clone());
            }
        }
    }
    Ok(resolved)
}

/// Searches the resolved cold indices, fanning out concurrently for more
/// than one index and reducing with the default merge.
async fn search_cold_indices(
    state: &AppState,
    indices: &[String],
    body: &[u8],
) -> BridgeResult<SearchResponse> {
    let resolved = resolve_cold_indices(state, indices).await?;
    if resolved.is_empty() {
        return Err(BridgeError::internal("no indices for cold search"));
    }
    if resolved.len() == 1 {
        return state.cold.search(&resolved[0], body).await;
    }

    let searches = resolved.iter().map(|index| state.cold.search(index, body));
    let results = join_all(searches).await;

    let mut merged: Option<SearchResponse> = None;
    for result in results {
        merged = merge(merged, Some(result?));
    }
    merged.ok_or_else(|| BridgeError::internal("no cold results to merge"))
}

struct MsearchEntry {
    indices: Vec<String>,
    body: Vec<u8>,
}

/// Parses an msearch NDJSON payload into (header, body) entries. Blank lines
/// are skipped; an odd line count is malformed.
fn parse_msearch_ndjson(
    body: &[u8],
    default_indices: &[String],
) -> Result<Vec<MsearchEntry>, String> {
    let lines: Vec<&[u8]> = body
        .split(|&b| b == b'\n')
        .map(|line| trim_ascii(line))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() % 2 != 0 {
        return Err("msearch expects an even number of lines".to_string());
    }

    let mut entries = Vec::with_capacity(lines.len() / 2);
    for pair in lines.chunks(2) {
        let header = pair[0];
        let query = pair[1];

        let mut indices = default_indices.to_vec();
        if let Ok(parsed) = serde_json::from_slice::<Value>(header) {
            if let Some(list) = parsed.get("index").and_then(Value::as_str) {
                if !list.is_empty() {
                    indices = split_indices(list);
                }
            }
        }
        entries.push(MsearchEntry {
            indices,
            body: query.to_vec(),
        });
    }
    Ok(entries)
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(start), Some(end)) => &line[start..=end],
        _ => &[],
    }
}

async fn handle_msearch(
    state: AppState,
    method: Method,
    path_and_query: String,
    headers: HeaderMap,
    body: Bytes,
    default_indices: Vec<String>,
) -> Response {
    let entries = match parse_msearch_ndjson(&body, &default_indices) {
        Ok(entries) => entries,
        Err(reason) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                json!({"error": "invalid msearch body", "detail": reason}),
            )
        }
    };
    if entries.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, json!({"error": "empty msearch"}));
    }

    // Entries without a resolvable index list, or touching system-internal
    // indices, take the whole batch down the compatibility path.
    if entries
        .iter()
        .any(|e| e.indices.is_empty() || has_internal(&e.indices))
    {
        return state.passthrough.forward(method, &path_and_query, &headers, body).await;
    }

    let auth = auth_header(&headers);

    // Authenticate once, up-front, when any entry needs cold data.
    let needs_cold = entries
        .iter()
        .any(|e| route_for_indices(&state, &e.body, &e.indices) != RouteTarget::HotOnly);
    if needs_cold {
        if let Err(response) = ensure_authenticated(&state, &auth).await {
            return response;
        }
    }

    let mut responses: Vec<Value> = Vec::with_capacity(entries.len());
    for entry in &entries {
        responses.push(msearch_entry_response(&state, entry, &auth).await);
    }

    Json(json!({"responses": responses})).into_response()
}

/// Processes one msearch entry, mapping failures into an in-position
/// `{error, status}` object rather than failing the whole batch.
async fn msearch_entry_response(state: &AppState, entry: &MsearchEntry, auth: &str) -> Value {
    let target = route_for_indices(state, &entry.body, &entry.indices);
    let needs_merge =
        target == RouteTarget::Both || (target == RouteTarget::ColdOnly && entry.indices.len() > 1);

    let fanout = if needs_merge {
        match plan_fanout(&entry.body) {
            Ok(fanout) => fanout,
            Err(err) => {
                return json!({"error": {"reason": err.to_string()}, "status": 400});
            }
        }
    } else {
        FanoutPlan {
            body: entry.body.clone(),
            merge: MergeOptions::default(),
        }
    };

    match target {
        RouteTarget::HotOnly => {
            let index = entry.indices.join(",");
            match state.hot.search(&index, &entry.body, Some(auth)).await {
                Ok(resp) => serde_json::to_value(resp).unwrap_or_else(|_| json!({})),
                Err(err) if err.is_auth_error() => {
                    json!({"error": {"reason": err.to_string()}, "status": err.auth_status()})
                }
                Err(err) => json!({"error": {"reason": err.to_string()}, "status": 502}),
            }
        }
        RouteTarget::ColdOnly => {
            match search_cold_indices(state, &entry.indices, &fanout.body).await {
                Ok(resp) => {
                    let resp = if needs_merge {
                        merge_with_options(None, Some(resp), &fanout.merge)
                    } else {
                        Some(resp)
                    };
                    serde_json::to_value(resp).unwrap_or_else(|_| json!({}))
                }
                Err(err) => json!({"error": {"reason": err.to_string()}, "status": 502}),
            }
        }
        RouteTarget::Both => {
            let index = entry.indices.join(",");
            let hot_leg = state.hot.search(&index, &fanout.body, Some(auth));
            let cold_leg = search_cold_indices(state, &entry.indices, &fanout.body);
            let (hot_result, cold_result) = tokio::join!(hot_leg, cold_leg);

            if let Err(err) = &hot_result {
                if err.is_auth_error() {
                    return json!({
                        "error": {"reason": "authentication failed"},
                        "status": err.auth_status()
                    });
                }
            }
            if hot_result.is_err() && cold_result.is_err() {
                return json!({"error": {"reason": "both backends failed"}, "status": 502});
            }

            let merged = merge_with_options(hot_result.ok(), cold_result.ok(), &fanout.merge);
            serde_json::to_value(merged).unwrap_or_else(|_| json!({}))
        }
    }
}
