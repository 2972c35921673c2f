//! Error types for Dual-Native operations.
//!
//! This module defines all error types that can occur when serving or
//! consuming machine representations. The [`Result`] type alias provides a
//! convenient shorthand for operations that may fail.
//!
//! # Error Categories
//!
//! | Category | Variants | Mutates state |
//! |----------|----------|---------------|
//! | Lookup | `NotFound` | No |
//! | Validation | `InvalidPayload`, `MissingBlock`, `UnsupportedBlock` | No |
//! | Concurrency | `PreconditionFailed` | No |
//! | Transport | `Http`, `Request`, `Timeout` | No |
//! | Collaborator | `Store`, `Upstream` | Depends on the store |
//!
//! Validation and concurrency errors are always detected *before* a mutation
//! is attempted; a request that fails with any of them leaves the resource
//! byte-for-byte unchanged.

use thiserror::Error;

/// Result type for Dual-Native operations.
pub type Result<T> = std::result::Result<T, DualNativeError>;

/// Errors that can occur while building, serving, or consuming a machine
/// representation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DualNativeError {
    /// The backing document does not exist.
    #[error("resource not found")]
    NotFound,

    /// The request body is not well-formed JSON of the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A write payload carried no block at all.
    #[error("write payload carries no block")]
    MissingBlock,

    /// A write payload carried a block that cannot be rendered into stored
    /// content (unknown kind, or a kind-appropriate field was empty).
    #[error("unsupported block: {0}")]
    UnsupportedBlock(String),

    /// An `If-Match` precondition did not match the current content
    /// fingerprint. Carries the current fingerprint so the caller can
    /// re-sync without a blind re-read.
    #[error("precondition failed; current fingerprint is {current}")]
    PreconditionFailed {
        /// The fingerprint the resource holds right now.
        current: String,
    },

    /// The document store reported a failure. The store guarantees no
    /// partial effect, so the resource is unchanged.
    #[error("store error: {0}")]
    Store(String),

    /// The summarization provider failed or timed out. Recovered locally via
    /// the heuristic fallback; never surfaced through the HTTP layer.
    #[error("upstream provider error: {0}")]
    Upstream(String),

    /// HTTP-level failure (unexpected status, missing header, bad body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Transport error from the underlying HTTP client.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
}

impl DualNativeError {
    /// Whether this error is a client-side validation failure (the request
    /// was wrong, not the service).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DualNativeError::InvalidPayload(_)
                | DualNativeError::MissingBlock
                | DualNativeError::UnsupportedBlock(_)
        )
    }

    /// Stable machine-readable code used in JSON error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            DualNativeError::NotFound => "not_found",
            DualNativeError::InvalidPayload(_) => "invalid_payload",
            DualNativeError::MissingBlock => "missing_block",
            DualNativeError::UnsupportedBlock(_) => "unsupported_block",
            DualNativeError::PreconditionFailed { .. } => "precondition_failed",
            DualNativeError::Upstream(_) => "upstream_error",
            DualNativeError::Timeout => "timeout",
            _ => "internal",
        }
    }
}
