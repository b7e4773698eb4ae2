use thiserror::Error;

/// Canonical error type for bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A backend HTTP call returned a non-2xx status.
    ///
    /// The status code is preserved so callers can make security decisions
    /// (distinguish 401/403 from transient backend failures) by matching on
    /// the variant instead of inspecting message strings.
    #[error("{url} returned status {status}: {body}")]
    Status {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Request URL that produced the response.
        url: String,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Transport-level HTTP failure (connect, timeout, TLS).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error during file staging or checkpoint persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Query uses features that cannot be merged across tiers.
    #[error("unsupported query: {reason}")]
    UnsupportedQuery {
        /// Human-readable rejection reason, surfaced to the client.
        reason: String,
    },

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },
}

impl BridgeError {
    /// Creates a `Status` variant from a backend response.
    #[must_use]
    pub fn status(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// Creates an `UnsupportedQuery` variant.
    #[must_use]
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedQuery {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error is an authoritative credential rejection
    /// (HTTP 401 or 403 from a backend).
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }

    /// Returns the status code to surface for an auth failure: 403 is
    /// preserved, everything else maps to 401.
    #[must_use]
    pub fn auth_status(&self) -> u16 {
        match self {
            Self::Status { status: 403, .. } => 403,
            _ => 401,
        }
    }

    /// Returns true if the backend answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Convenient result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
