//! End-to-end self-test validator.
//!
//! Exercises a live service and cross-checks every layer: the MR fields, the
//! ETag/CID parity, an independent client-side CID recompute, the response
//! integrity digest, and the 304 short-circuit, for the MR and again for the
//! rendered projection in its own fingerprint space. Each step yields an
//! independent pass/warn/fail line; a missing optional header is a warning, a
//! mismatch on a comparable value is a failure. The run never mutates
//! resource state.

use crate::cid::{compute_cid, fingerprint_bytes, DEFAULT_EXCLUDE_KEYS};
use crate::client::DualNativeClient;
use crate::conditional::{format_etag, normalize_validator};
use crate::error::Result;
use crate::server::digest::digest_value;
use reqwest::header;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

/// Severity of one validation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLevel {
    Pass,
    Warn,
    Fail,
}

/// One validation result line.
#[derive(Debug, Clone)]
pub struct CheckLine {
    pub level: CheckLevel,
    pub name: String,
    pub detail: String,
}

impl fmt::Display for CheckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            CheckLevel::Pass => "PASS",
            CheckLevel::Warn => "WARN",
            CheckLevel::Fail => "FAIL",
        };
        write!(f, "{level} {}: {}", self.name, self.detail)
    }
}

/// Full validation run output.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub lines: Vec<CheckLine>,
}

impl ValidationReport {
    /// True when no line failed (warnings allowed).
    #[must_use]
    pub fn passed(&self) -> bool {
        self.lines.iter().all(|l| l.level != CheckLevel::Fail)
    }

    fn pass(&mut self, name: &str, detail: impl Into<String>) {
        self.push(CheckLevel::Pass, name, detail.into());
    }

    fn warn(&mut self, name: &str, detail: impl Into<String>) {
        self.push(CheckLevel::Warn, name, detail.into());
    }

    fn fail(&mut self, name: &str, detail: impl Into<String>) {
        self.push(CheckLevel::Fail, name, detail.into());
    }

    fn push(&mut self, level: CheckLevel, name: &str, detail: String) {
        self.lines.push(CheckLine {
            level,
            name: name.to_string(),
            detail,
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        write!(f, "{}", if self.passed() { "PASS" } else { "FAIL" })
    }
}

/// MR fields every snapshot must carry.
const REQUIRED_FIELDS: &[&str] = &[
    "rid",
    "title",
    "status",
    "blocks",
    "word_count",
    "core_content_text",
    "cid",
];

/// Validate one resource against a live service.
///
/// Only transport-level errors surface as `Err`; every semantic check lands
/// in the report.
pub async fn validate_resource(client: &DualNativeClient, rid: u64) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    let mr_url = format!("{}/resources/{rid}", client.base_url());

    // 1. Fetch the MR and assert required fields.
    let response = client.http().get(&mr_url).send().await?;
    if response.status() != StatusCode::OK {
        report.fail("mr.fetch", format!("expected 200, got {}", response.status()));
        return Ok(report);
    }
    let etag = normalized_etag(&response);
    let digest_header = header_string(&response, "content-digest");
    let body = response.text().await?;
    let mr: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(err) => {
            report.fail("mr.fetch", format!("body is not JSON: {err}"));
            return Ok(report);
        }
    };
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|f| mr.get(**f).is_none())
        .copied()
        .collect();
    if missing.is_empty() {
        report.pass("mr.fields", "all required fields present");
    } else {
        report.fail("mr.fields", format!("missing fields: {}", missing.join(", ")));
    }
    let cid = mr["cid"].as_str().unwrap_or_default().to_string();
    if cid.starts_with("sha256-") {
        report.pass("mr.cid_format", cid.clone());
    } else {
        report.fail("mr.cid_format", format!("malformed CID: {cid:?}"));
    }

    // 2. ETag parity with the MR's own cid field.
    match &etag {
        None => report.warn("mr.etag", "no ETag header on MR response"),
        Some(etag) if *etag == cid => report.pass("mr.etag", "ETag equals MR cid"),
        Some(etag) => report.fail("mr.etag", format!("ETag {etag} != cid {cid}")),
    }

    // 3. Independent client-side recompute with the same exclude-key rule.
    let recomputed = compute_cid(&mr, DEFAULT_EXCLUDE_KEYS);
    if recomputed == cid {
        report.pass("mr.recompute", "client-side CID matches");
    } else {
        report.fail(
            "mr.recompute",
            format!("server {cid} vs client {recomputed}"),
        );
    }

    // 4. Integrity digest over a fresh uncompressed fetch.
    match digest_header {
        None => report.warn("mr.digest", "no Content-Digest header"),
        Some(_) => {
            let raw = client.http().get(&mr_url).send().await?;
            let fresh_digest = header_string(&raw, "content-digest");
            let bytes = raw.bytes().await?;
            match fresh_digest {
                None => report.warn("mr.digest", "Content-Digest missing on re-fetch"),
                Some(expected) if expected == digest_value(&bytes) => {
                    report.pass("mr.digest", "digest matches exact body bytes");
                }
                Some(expected) => report.fail(
                    "mr.digest",
                    format!("digest {expected} does not match body bytes"),
                ),
            }
        }
    }

    // 5. Conditional re-read must short-circuit.
    let conditional = client
        .http()
        .get(&mr_url)
        .header(header::IF_NONE_MATCH, format_etag(&cid))
        .send()
        .await?;
    if conditional.status() == StatusCode::NOT_MODIFIED {
        let bytes = conditional.bytes().await?;
        if bytes.is_empty() {
            report.pass("mr.not_modified", "304 with empty body");
        } else {
            report.fail("mr.not_modified", "304 carried a body");
        }
    } else {
        report.fail(
            "mr.not_modified",
            format!("expected 304, got {}", conditional.status()),
        );
    }

    // 6. The rendered projection, in its own fingerprint space.
    validate_rendered(client, rid, &mut report).await?;
    Ok(report)
}

async fn validate_rendered(
    client: &DualNativeClient,
    rid: u64,
    report: &mut ValidationReport,
) -> Result<()> {
    let url = format!("{}/resources/{rid}/rendered", client.base_url());
    let response = client.http().get(&url).send().await?;
    if response.status() != StatusCode::OK {
        report.fail(
            "rendered.fetch",
            format!("expected 200, got {}", response.status()),
        );
        return Ok(());
    }
    let etag = normalized_etag(&response);
    let content_type = header_string(&response, "content-type").unwrap_or_default();
    if content_type.contains("text/markdown") {
        report.pass("rendered.content_type", content_type);
    } else {
        report.warn(
            "rendered.content_type",
            format!("expected text/markdown, got {content_type:?}"),
        );
    }
    let bytes = response.bytes().await?;
    let Some(etag) = etag else {
        report.warn("rendered.etag", "no ETag header on rendered response");
        return Ok(());
    };
    // The rendered fingerprint is over the bytes themselves, not the MR CID.
    if fingerprint_bytes(&bytes) == etag {
        report.pass("rendered.fingerprint", "ETag matches rendered bytes");
    } else {
        report.fail(
            "rendered.fingerprint",
            format!("ETag {etag} does not hash the rendered bytes"),
        );
    }

    let conditional = client
        .http()
        .get(&url)
        .header(header::IF_NONE_MATCH, format_etag(&etag))
        .send()
        .await?;
    if conditional.status() == StatusCode::NOT_MODIFIED {
        report.pass("rendered.not_modified", "304 on matching fingerprint");
    } else {
        report.fail(
            "rendered.not_modified",
            format!("expected 304, got {}", conditional.status()),
        );
    }
    Ok(())
}

fn normalized_etag(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| normalize_validator(v).to_string())
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_passes_with_warnings_only() {
        let mut report = ValidationReport::default();
        report.pass("a", "ok");
        report.warn("b", "optional header absent");
        assert!(report.passed());
        report.fail("c", "mismatch");
        assert!(!report.passed());
    }

    #[test]
    fn lines_render_with_level_prefix() {
        let line = CheckLine {
            level: CheckLevel::Warn,
            name: "mr.digest".into(),
            detail: "no Content-Digest header".into(),
        };
        assert_eq!(line.to_string(), "WARN mr.digest: no Content-Digest header");
    }
}
