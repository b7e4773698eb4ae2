//! Request path taxonomy: which endpoints the proxy intercepts.

/// The endpoint class of an incoming request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// `/{indices}/_search` or `/_search`.
    Search,
    /// `/{indices}/_msearch` or `/_msearch`.
    MSearch,
    /// Anything else: reverse-proxied verbatim.
    Passthrough,
}

/// Parses a request path into its endpoint kind and index list.
pub fn parse_endpoint(path: &str) -> (EndpointKind, Vec<String>) {
    let trimmed = path.trim_end_matches('/');
    match trimmed {
        "" => return (EndpointKind::Passthrough, Vec::new()),
        "/_search" => return (EndpointKind::Search, Vec::new()),
        "/_msearch" => return (EndpointKind::MSearch, Vec::new()),
        _ => {}
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return (EndpointKind::Passthrough, Vec::new());
    };
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() != 2 {
        return (EndpointKind::Passthrough, Vec::new());
    }

    let indices = split_indices(parts[0]);
    match parts[1] {
        "_search" => (EndpointKind::Search, indices),
        "_msearch" => (EndpointKind::MSearch, indices),
        _ => (EndpointKind::Passthrough, Vec::new()),
    }
}

/// Splits a comma-separated index segment, dropping empty entries.
pub fn split_indices(segment: &str) -> Vec<String> {
    segment
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
