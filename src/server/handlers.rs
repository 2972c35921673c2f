//! Request handlers for the Dual-Native routes.

use crate::builder::{build_mr, escape_html};
use crate::cid::{compute_cid, fingerprint_bytes, DEFAULT_EXCLUDE_KEYS};
use crate::error::{DualNativeError, Result};
use crate::model::{ContentBlock, Links, MachineRepresentation, RawBlock};
use crate::render::to_markdown;
use crate::conditional::{format_etag, if_match_satisfied, if_none_match_matches};
use crate::server::AppState;
use crate::store::{CatalogFilter, RawDocument, StatusFilter};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

const CACHE_CONTROL: &str = "max-age=0, must-revalidate";

/// `GET /resources/:id`: MR JSON with conditional-read support.
pub async fn get_mr(
    State(state): State<AppState>,
    Path(rid): Path<u64>,
    headers: HeaderMap,
) -> Result<Response> {
    let doc = load_document(&state, rid).await?;
    let (_, mut value) = materialize(&state, &doc)?;
    let cid = current_cid(&state, rid, &value);
    value["cid"] = Value::String(cid.clone());

    if let Some(inm) = header_str(&headers, header::IF_NONE_MATCH) {
        if if_none_match_matches(inm, &cid) {
            tracing::debug!(rid, "conditional read short-circuited");
            return Ok(not_modified(&cid, Some(doc.modified)));
        }
    }
    tracing::debug!(rid, %cid, "serving machine representation");
    Ok(decorate(
        Json(value).into_response(),
        &cid,
        Some(doc.modified),
    ))
}

/// `GET /resources/:id/rendered`: markdown projection.
///
/// The projection's fingerprint is computed over its own bytes, a separate
/// fingerprint space from the MR CID.
pub async fn get_rendered(
    State(state): State<AppState>,
    Path(rid): Path<u64>,
    headers: HeaderMap,
) -> Result<Response> {
    let doc = load_document(&state, rid).await?;
    let (mr, _) = materialize(&state, &doc)?;
    let mut markdown = to_markdown(&mr);
    for transform in &state.extensions.render_transforms {
        markdown = transform(markdown);
    }
    let fingerprint = fingerprint_bytes(markdown.as_bytes());

    if let Some(inm) = header_str(&headers, header::IF_NONE_MATCH) {
        if if_none_match_matches(inm, &fingerprint) {
            return Ok(not_modified(&fingerprint, Some(doc.modified)));
        }
    }
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/markdown; charset=utf-8")
        .body(Body::from(markdown))
        .map_err(|e| DualNativeError::Http(e.to_string()))?;
    decorate_in_place(&mut response, &fingerprint, Some(doc.modified));
    Ok(response)
}

/// Write payload for `POST /resources/:id/blocks`.
#[derive(Debug)]
pub(crate) struct InsertPayload {
    pub(crate) position: InsertPosition,
    pub(crate) blocks: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertPosition {
    Append,
    Prepend,
    Index(Option<i64>),
}

impl InsertPayload {
    /// Parse `{insert, index?, block|blocks}`. Fails closed before any
    /// mutation is attempted.
    pub(crate) fn parse(body: &Value) -> Result<Self> {
        let obj = body
            .as_object()
            .ok_or_else(|| DualNativeError::InvalidPayload("body must be a JSON object".into()))?;

        let position = match obj.get("insert").and_then(Value::as_str) {
            Some("prepend") => InsertPosition::Prepend,
            Some("index") => InsertPosition::Index(obj.get("index").and_then(Value::as_i64)),
            // The original write surface treats anything else as append.
            _ => InsertPosition::Append,
        };

        let entries: Vec<Value> = if let Some(blocks) = obj.get("blocks").and_then(Value::as_array) {
            blocks.clone()
        } else if let Some(block) = obj.get("block").filter(|b| b.is_object()) {
            vec![block.clone()]
        } else {
            Vec::new()
        };
        if entries.is_empty() {
            return Err(DualNativeError::MissingBlock);
        }

        let mut blocks = Vec::with_capacity(entries.len());
        for entry in entries {
            let kind = entry
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("(untyped)")
                .to_string();
            let block: ContentBlock = serde_json::from_value(entry)
                .map_err(|_| DualNativeError::UnsupportedBlock(kind))?;
            blocks.push(block);
        }
        Ok(InsertPayload { position, blocks })
    }

    /// Effective insertion index, clamped into `[0, count_before]`.
    pub(crate) fn inserted_at(&self, count_before: usize) -> usize {
        match self.position {
            InsertPosition::Prepend => 0,
            InsertPosition::Append => count_before,
            InsertPosition::Index(index) => {
                let requested = index.unwrap_or(count_before as i64).max(0) as usize;
                requested.min(count_before)
            }
        }
    }
}

/// `POST /resources/:id/blocks`: optimistic-concurrency block insertion.
pub async fn insert_blocks(
    State(state): State<AppState>,
    Path(rid): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response> {
    let doc = load_document(&state, rid).await?;
    let payload = InsertPayload::parse(&body)?;

    // Precondition check against the *current* fingerprint, before any
    // mutation. A stale token fails fast with no partial write.
    if let Some(if_match) = header_str(&headers, header::IF_MATCH) {
        if !if_match.trim().is_empty() {
            let (_, value) = materialize(&state, &doc)?;
            let current = current_cid(&state, rid, &value);
            if !if_match_satisfied(if_match, &current) {
                tracing::info!(rid, %current, "write rejected: stale If-Match");
                return Err(DualNativeError::PreconditionFailed { current });
            }
        }
    }

    let mut raw_blocks = Vec::with_capacity(payload.blocks.len());
    for block in &payload.blocks {
        let raw = block_to_raw(block).ok_or_else(|| {
            DualNativeError::UnsupportedBlock(format!("{block:?} renders to no content"))
        })?;
        raw_blocks.push(raw);
    }

    let count_before = doc.blocks.len();
    let inserted_at = payload.inserted_at(count_before);

    let mut new_blocks = doc.blocks.clone();
    new_blocks.splice(inserted_at..inserted_at, raw_blocks);
    let count_after = new_blocks.len();
    state.store.replace_blocks(rid, new_blocks).await?;

    // Invalidate-then-recompute: never serve a fingerprint for a resource
    // known to have just changed.
    state.cids.invalidate(rid);
    let updated = load_document(&state, rid).await?;
    let (_, mut value) = materialize(&state, &updated)?;
    let cid = compute_exclude(&state, &value);
    state.cids.put(rid, cid.clone());
    value["cid"] = Value::String(cid.clone());

    tracing::info!(rid, count_before, inserted_at, count_after, %cid, "blocks inserted");

    let mut response = Json(value).into_response();
    decorate_in_place(&mut response, &cid, Some(updated.modified));
    let headers_mut = response.headers_mut();
    if let Ok(v) = count_before.to_string().parse() {
        headers_mut.insert("x-block-count-before", v);
    }
    if let Ok(v) = inserted_at.to_string().parse() {
        headers_mut.insert("x-inserted-at", v);
    }
    if let Ok(v) = count_after.to_string().parse() {
        headers_mut.insert("x-block-count", v);
    }
    Ok(response)
}

/// Query parameters for `GET /catalog`.
#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub since: Option<DateTime<Utc>>,
    pub status: Option<String>,
    /// Comma-separated document types.
    pub types: Option<String>,
}

/// `GET /catalog`: resource listing, most-recently-modified first.
pub async fn get_catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Response> {
    let filter = CatalogFilter {
        since: query.since,
        status: StatusFilter::parse(query.status.as_deref()),
        types: query
            .types
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };
    let documents = state.store.list(&filter).await?;
    let mut items = Vec::with_capacity(documents.len());
    for doc in &documents {
        let (_, value) = materialize(&state, doc)?;
        let cid = current_cid(&state, doc.rid, &value);
        items.push(json!({
            "rid": doc.rid,
            "cid": cid,
            "modified": doc.modified,
            "status": doc.status,
            "title": doc.title,
        }));
    }
    Ok(Json(json!({ "count": items.len(), "items": items })).into_response())
}

/// `GET /resources/:id/suggest`: summary, tags, and headings.
pub async fn get_suggest(
    State(state): State<AppState>,
    Path(rid): Path<u64>,
) -> Result<Response> {
    let doc = load_document(&state, rid).await?;
    let mr = build_mr(&doc, links_for(&state.config.base_url, rid));
    let suggestion = state.suggester.suggest(&mr).await;
    Ok(Json(suggestion).into_response())
}

async fn load_document(state: &AppState, rid: u64) -> Result<RawDocument> {
    state
        .store
        .load(rid)
        .await?
        .ok_or(DualNativeError::NotFound)
}

/// Build the MR and its post-transform JSON value.
fn materialize(
    state: &AppState,
    doc: &RawDocument,
) -> Result<(MachineRepresentation, Value)> {
    let mr = build_mr(doc, links_for(&state.config.base_url, doc.rid));
    let mut value = serde_json::to_value(&mr)?;
    for transform in &state.extensions.mr_transforms {
        value = transform(value);
    }
    Ok((mr, value))
}

fn links_for(base_url: &str, rid: u64) -> Links {
    let base = base_url.trim_end_matches('/');
    Links {
        human_url: format!("{base}/documents/{rid}"),
        api_url: format!("{base}/resources/{rid}"),
        md_url: format!("{base}/resources/{rid}/rendered"),
    }
}

/// Cached fingerprint for a resource, computed lazily from its post-transform
/// value on first read after an invalidation.
fn current_cid(state: &AppState, rid: u64, value: &Value) -> String {
    if let Some(cached) = state.cids.get(rid) {
        return cached;
    }
    let cid = compute_exclude(state, value);
    state.cids.put(rid, cid.clone());
    cid
}

fn compute_exclude(state: &AppState, value: &Value) -> String {
    let mut exclude: Vec<&str> = DEFAULT_EXCLUDE_KEYS.to_vec();
    exclude.extend(
        state
            .extensions
            .extra_exclude_keys
            .iter()
            .map(String::as_str),
    );
    compute_cid(value, &exclude)
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn not_modified(fingerprint: &str, modified: Option<DateTime<Utc>>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    decorate_in_place(&mut response, fingerprint, modified);
    response
}

fn decorate(mut response: Response, fingerprint: &str, modified: Option<DateTime<Utc>>) -> Response {
    decorate_in_place(&mut response, fingerprint, modified);
    response
}

/// Attach `ETag`, `Cache-Control`, and (when known) `Last-Modified`.
fn decorate_in_place(response: &mut Response, fingerprint: &str, modified: Option<DateTime<Utc>>) {
    let headers = response.headers_mut();
    if let Ok(value) = format_etag(fingerprint).parse() {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = CACHE_CONTROL.parse() {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Some(modified) = modified {
        let formatted = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(value) = formatted.parse() {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

/// Serialize a typed block back into the store's raw-block shape.
///
/// Returns `None` when the block renders to no stored content, which the
/// write path reports as `UnsupportedBlock`.
pub(crate) fn block_to_raw(block: &ContentBlock) -> Option<RawBlock> {
    match block {
        ContentBlock::Paragraph { text } => {
            if text.trim().is_empty() {
                return None;
            }
            Some(RawBlock::leaf(
                "paragraph",
                &format!("<p>{}</p>", escape_html(text)),
            ))
        }
        ContentBlock::Heading { level, text } => {
            if text.trim().is_empty() {
                return None;
            }
            let level = (*level).clamp(1, 6);
            Some(RawBlock {
                name: "heading".into(),
                attrs: json!({ "level": level }),
                inner_html: format!("<h{level}>{}</h{level}>", escape_html(text)),
                inner_blocks: Vec::new(),
            })
        }
        ContentBlock::List { ordered, items } => {
            if items.is_empty() {
                return None;
            }
            let tag = if *ordered { "ol" } else { "ul" };
            let li: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", escape_html(item)))
                .collect();
            Some(RawBlock {
                name: "list".into(),
                attrs: json!({ "ordered": ordered }),
                inner_html: format!("<{tag}>{li}</{tag}>"),
                inner_blocks: Vec::new(),
            })
        }
        ContentBlock::Image { id, url, alt_text } => {
            let url = url.as_deref().filter(|u| !u.is_empty())?;
            Some(RawBlock {
                name: "image".into(),
                attrs: json!({ "id": id, "alt": alt_text }),
                inner_html: format!(
                    r#"<figure><img src="{}" alt="{}"/></figure>"#,
                    escape_html(url),
                    escape_html(alt_text)
                ),
                inner_blocks: Vec::new(),
            })
        }
        ContentBlock::Code { text } => {
            if text.is_empty() {
                return None;
            }
            Some(RawBlock::leaf(
                "code",
                &format!("<pre><code>{}</code></pre>", escape_html(text)),
            ))
        }
        ContentBlock::Quote { text } => {
            if text.trim().is_empty() {
                return None;
            }
            Some(RawBlock::leaf(
                "quote",
                &format!("<blockquote><p>{}</p></blockquote>", escape_html(text)),
            ))
        }
        ContentBlock::Generic { kind, text } => {
            if text.trim().is_empty() {
                return None;
            }
            let name = if kind.is_empty() { "unknown" } else { kind };
            Some(RawBlock::leaf(name, &format!("<p>{}</p>", escape_html(text))))
        }
    }
}
