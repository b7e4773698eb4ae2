//! Shared HTTP client construction with per-backend TLS settings.

use oqbridge_core::config::TlsConfig;
use oqbridge_core::{BridgeError, BridgeResult};

/// Builds a reqwest client honoring the backend's TLS settings. With neither
/// `skip_verify` nor a CA certificate configured this is a plain default
/// client.
pub fn build_client(tls: &TlsConfig) -> BridgeResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if tls.skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if !tls.ca_cert.is_empty() {
        let pem = std::fs::read(&tls.ca_cert)?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            BridgeError::internal(format!("failed to parse CA certificate {}: {e}", tls.ca_cert))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().map_err(BridgeError::from)
}

/// Reads a response body and maps any non-2xx status to a typed
/// [`BridgeError::Status`] carrying the status code, URL, and body.
pub(crate) async fn read_success(
    url: &str,
    resp: reqwest::Response,
) -> BridgeResult<bytes::Bytes> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await?;
    if status >= 400 {
        return Err(BridgeError::status(
            status,
            url,
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }
    Ok(body)
}
