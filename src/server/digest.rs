//! Response integrity digest middleware (RFC 9530 `Content-Digest`).
//!
//! Computed over the exact serialized response bytes after every header and
//! body decision is final, independent of any `ETag`. It validates the
//! transport layer, not the content model: a correct CID with corrupted wire
//! bytes is exactly the failure this header exposes. Digest computation is
//! best-effort; a failure drops the header, never the response.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

static CONTENT_DIGEST: HeaderName = HeaderName::from_static("content-digest");

/// Build the `Content-Digest` header value for a body.
#[must_use]
pub fn digest_value(body: &[u8]) -> String {
    format!("sha-256=:{}:", BASE64.encode(Sha256::digest(body)))
}

/// Axum middleware attaching `Content-Digest` to successful non-empty
/// responses.
pub async fn content_digest_layer(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !status.is_success() || status == StatusCode::NO_CONTENT {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The body is gone; all we can do is ship headers.
            tracing::warn!("content-digest: failed to buffer response body: {err}");
            return Response::from_parts(parts, Body::empty());
        }
    };
    if !bytes.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&digest_value(&bytes)) {
            parts.headers.insert(CONTENT_DIGEST.clone(), value);
        }
    }
    Response::from_parts(parts, Body::from(bytes))
}
