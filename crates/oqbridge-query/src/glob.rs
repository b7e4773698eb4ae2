//! Wildcard matching over index names.

use globset::Glob;

/// Returns true when the string contains wildcard metacharacters.
#[must_use]
pub fn contains_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '[', ']'])
}

/// Reports whether `name` matches the wildcard `pattern` (`*`, `?`, `[…]`).
/// An invalid pattern matches nothing.
#[must_use]
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    Glob::new(pattern)
        .map(|g| g.compile_matcher().is_match(name))
        .unwrap_or(false)
}

/// Returns true when any index name is system-internal (starts with `.`).
#[must_use]
pub fn has_internal(indices: &[String]) -> bool {
    indices.iter().any(|idx| idx.starts_with('.'))
}

/// Returns true when any index name contains wildcard metacharacters.
#[must_use]
pub fn has_wildcard(indices: &[String]) -> bool {
    indices.iter().any(|idx| contains_wildcard(idx))
}
