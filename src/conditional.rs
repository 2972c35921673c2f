//! Conditional request header grammar and evaluation.
//!
//! `If-None-Match` and `If-Match` carry comma-separated validator tokens,
//! each optionally prefixed with the weak marker `W/` and optionally
//! double-quoted. Tokens are normalized (marker and quotes stripped) before
//! comparison with the current fingerprint, matching the loose grammar real
//! agents send. `If-Match: *` always satisfies the precondition.

/// Strip an optional weak-validator marker and surrounding quotes.
#[must_use]
pub fn normalize_validator(token: &str) -> &str {
    let mut t = token.trim();
    if t.len() >= 2 && (t.starts_with("W/") || t.starts_with("w/")) {
        t = t[2..].trim();
    }
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t = &t[1..t.len() - 1];
    }
    t
}

/// Whether any `If-None-Match` token equals the current fingerprint.
#[must_use]
pub fn if_none_match_matches(header: &str, current: &str) -> bool {
    header
        .split(',')
        .any(|token| normalize_validator(token) == current)
}

/// Whether an `If-Match` header is satisfied by the current fingerprint.
///
/// `*` always satisfies; otherwise at least one normalized token must equal
/// the current fingerprint. An empty or all-whitespace header is treated as
/// absent (satisfied); the caller decides whether to require the header.
#[must_use]
pub fn if_match_satisfied(header: &str, current: &str) -> bool {
    if header.trim().is_empty() {
        return true;
    }
    header.split(',').any(|token| {
        let t = token.trim();
        t == "*" || normalize_validator(t) == current
    })
}

/// Quote a fingerprint for use as an `ETag` header value.
#[must_use]
pub fn format_etag(fingerprint: &str) -> String {
    format!("\"{fingerprint}\"")
}
