//! Transparent reverse proxy to the hot store.
//!
//! Non-intercepted requests (and last-resort fallbacks) are forwarded
//! verbatim: same method, path, query, body, and headers. The client's
//! Authorization header is never rewritten; the hot store validates the
//! original user credentials itself.

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use oqbridge_core::BridgeResult;
use tracing::error;

/// Single-host reverse proxy to the hot store.
pub struct Passthrough {
    base_url: String,
    client: reqwest::Client,
}

impl Passthrough {
    /// Creates a passthrough targeting the given base URL, with a client
    /// that may carry custom TLS settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Forwards the request and relays the hot store's response verbatim.
    /// A transport failure maps to 502.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        match self.try_forward(method, path_and_query, headers, body).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "passthrough to hot store failed");
                (
                    StatusCode::BAD_GATEWAY,
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    r#"{"error":"hot store unreachable"}"#,
                )
                    .into_response()
            }
        }
    }

    async fn try_forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> BridgeResult<Response> {
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut req = self.client.request(method, &url).body(body);
        for (name, value) in headers {
            // Hop-by-hop headers are owned by each connection.
            if *name == axum::http::header::HOST || *name == axum::http::header::CONTENT_LENGTH {
                continue;
            }
            req = req.header(name.clone(), value.clone());
        }

        let upstream = req.send().await?;
        let status = upstream.status();
        let mut response_headers = HeaderMap::new();
        for (name, value) in upstream.headers() {
            if *name == axum::http::header::TRANSFER_ENCODING
                || *name == axum::http::header::CONNECTION
            {
                continue;
            }
            response_headers.insert(name.clone(), value.clone());
        }
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}
