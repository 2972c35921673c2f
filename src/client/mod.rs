//! Dual-Native HTTP client with conditional reads and optimistic writes.
//!
//! The client caches `(fingerprint, body)` per resource path and uses the
//! cache to populate `If-None-Match` on reads and `If-Match` on writes, so an
//! unchanged resource costs a 304 and a concurrently-edited one fails the
//! write with a 412 instead of clobbering it.

mod cache;
mod config;
pub mod validate;

pub use cache::{CacheEntry, ClientCache};
pub use config::ClientConfig;

use crate::conditional::{format_etag, normalize_validator};
use crate::error::{DualNativeError, Result};
use crate::model::ContentBlock;
use chrono::{DateTime, Utc};
use reqwest::header;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Where a write should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Append,
    Prepend,
    /// Clamped server-side into `[0, count_before]`.
    Index(i64),
}

/// The `If-Match` policy of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Use the cached fingerprint, if any.
    FromCache,
    /// Use an explicit fingerprint token.
    Token(String),
    /// `*`: any current representation satisfies.
    Any,
    /// No precondition; an unconditional write.
    None,
}

/// Outcome of a conditional read.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: u16,
    /// True when the service answered 304 and `body` came from cache.
    pub not_modified: bool,
    /// Normalized fingerprint from the `ETag` header.
    pub etag: Option<String>,
    pub body: Option<String>,
}

impl FetchOutcome {
    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| DualNativeError::Http("response has no body".into()))?;
        Ok(serde_json::from_str(body)?)
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub mr: Value,
    /// The resource's new fingerprint.
    pub etag: String,
    pub count_before: Option<usize>,
    pub inserted_at: Option<usize>,
    pub count_after: Option<usize>,
}

/// One catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItem {
    pub rid: u64,
    pub cid: String,
    pub modified: DateTime<Utc>,
    pub status: String,
    pub title: String,
}

/// Catalog listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    pub count: usize,
    pub items: Vec<CatalogItem>,
}

/// Catalog query.
#[derive(Debug, Clone, Default)]
pub struct CatalogRequest {
    pub since: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub types: Option<String>,
}

/// The Dual-Native HTTP client.
pub struct DualNativeClient {
    http: reqwest::Client,
    base_url: String,
    cache: ClientCache,
    config: ClientConfig,
}

impl DualNativeClient {
    /// Create a client with default configuration.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(base_url: &str, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(DualNativeError::Request)?;
        Ok(DualNativeClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: ClientCache::default(),
            config,
        })
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client (used by the validator for raw fetches).
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The consumer-side cache.
    #[must_use]
    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Conditional read of a machine representation.
    pub async fn get_mr(&self, rid: u64) -> Result<FetchOutcome> {
        self.conditional_get(&format!("/resources/{rid}"), &mr_key(rid))
            .await
    }

    /// Conditional read of the rendered projection.
    pub async fn get_rendered(&self, rid: u64) -> Result<FetchOutcome> {
        self.conditional_get(&format!("/resources/{rid}/rendered"), &rendered_key(rid))
            .await
    }

    async fn conditional_get(&self, path: &str, cache_key: &str) -> Result<FetchOutcome> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if let Some(fingerprint) = self.cache.fingerprint(cache_key) {
            request = request.header(header::IF_NONE_MATCH, format_etag(&fingerprint));
        }
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| normalize_validator(v).to_string());

        match status {
            StatusCode::NOT_MODIFIED => {
                tracing::debug!(%url, "not modified; serving cached body");
                Ok(FetchOutcome {
                    status: status.as_u16(),
                    not_modified: true,
                    etag,
                    body: self.cache.get(cache_key).map(|e| e.last_body),
                })
            }
            StatusCode::OK => {
                let body = response.text().await.map_err(map_transport)?;
                if let Some(fingerprint) = &etag {
                    self.cache.store(cache_key, fingerprint.clone(), body.clone());
                }
                Ok(FetchOutcome {
                    status: status.as_u16(),
                    not_modified: false,
                    etag,
                    body: Some(body),
                })
            }
            StatusCode::NOT_FOUND => Err(DualNativeError::NotFound),
            other => Err(DualNativeError::Http(format!(
                "unexpected status {other} from {url}"
            ))),
        }
    }

    /// Insert blocks into a resource with optimistic concurrency.
    ///
    /// On a 412 the error carries the current fingerprint and the stale cache
    /// entry is dropped, so the caller can re-read and retry.
    pub async fn insert_blocks(
        &self,
        rid: u64,
        at: InsertAt,
        blocks: &[ContentBlock],
        precondition: Precondition,
    ) -> Result<WriteOutcome> {
        let url = format!("{}/resources/{rid}/blocks", self.base_url);
        let mut body = json!({ "blocks": blocks });
        match at {
            InsertAt::Append => body["insert"] = json!("append"),
            InsertAt::Prepend => body["insert"] = json!("prepend"),
            InsertAt::Index(index) => {
                body["insert"] = json!("index");
                body["index"] = json!(index);
            }
        }

        let mut request = self.http.post(&url).json(&body);
        let effective = if self.config.unconditional_writes
            && precondition == Precondition::FromCache
        {
            Precondition::None
        } else {
            precondition
        };
        match effective {
            Precondition::FromCache => {
                if let Some(fingerprint) = self.cache.fingerprint(&mr_key(rid)) {
                    request = request.header(header::IF_MATCH, format_etag(&fingerprint));
                }
            }
            Precondition::Token(token) => {
                request = request.header(header::IF_MATCH, format_etag(&token));
            }
            Precondition::Any => {
                request = request.header(header::IF_MATCH, "*");
            }
            Precondition::None => {}
        }

        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| normalize_validator(v).to_string());

        match status {
            StatusCode::OK => {
                let count_before = header_usize(&response, "x-block-count-before");
                let inserted_at = header_usize(&response, "x-inserted-at");
                let count_after = header_usize(&response, "x-block-count");
                let body = response.text().await.map_err(map_transport)?;
                let mr: Value = serde_json::from_str(&body)?;
                let etag = etag.ok_or_else(|| {
                    DualNativeError::Http("write response carried no ETag".into())
                })?;
                self.cache.store(&mr_key(rid), etag.clone(), body);
                Ok(WriteOutcome {
                    mr,
                    etag,
                    count_before,
                    inserted_at,
                    count_after,
                })
            }
            StatusCode::PRECONDITION_FAILED => {
                self.cache.invalidate(&mr_key(rid));
                Err(DualNativeError::PreconditionFailed {
                    current: etag.unwrap_or_default(),
                })
            }
            StatusCode::NOT_FOUND => Err(DualNativeError::NotFound),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                let code = body["error"].as_str().unwrap_or("invalid_payload");
                Err(match code {
                    "missing_block" => DualNativeError::MissingBlock,
                    "unsupported_block" => DualNativeError::UnsupportedBlock(
                        body["message"].as_str().unwrap_or("").to_string(),
                    ),
                    _ => DualNativeError::InvalidPayload(
                        body["message"].as_str().unwrap_or("malformed write").to_string(),
                    ),
                })
            }
            other => Err(DualNativeError::Http(format!(
                "unexpected status {other} from {url}"
            ))),
        }
    }

    /// List resources visible to the caller.
    pub async fn catalog(&self, query: CatalogRequest) -> Result<CatalogPage> {
        let url = format!("{}/catalog", self.base_url);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(since) = query.since {
            params.push(("since", since.to_rfc3339()));
        }
        if let Some(status) = query.status {
            params.push(("status", status));
        }
        if let Some(types) = query.types {
            params.push(("types", types));
        }
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(map_transport)?;
        if response.status() != StatusCode::OK {
            return Err(DualNativeError::Http(format!(
                "unexpected status {} from {url}",
                response.status()
            )));
        }
        Ok(response.json().await.map_err(map_transport)?)
    }
}

/// Cache key of a resource's MR.
pub(crate) fn mr_key(rid: u64) -> String {
    rid.to_string()
}

/// Cache key of a resource's rendered projection (its own fingerprint space).
pub(crate) fn rendered_key(rid: u64) -> String {
    format!("{rid}/rendered")
}

fn header_usize(response: &reqwest::Response, name: &str) -> Option<usize> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn map_transport(err: reqwest::Error) -> DualNativeError {
    if err.is_timeout() {
        DualNativeError::Timeout
    } else {
        DualNativeError::Request(err)
    }
}
