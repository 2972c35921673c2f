//! MR builder: raw document state in, machine representation out.
//!
//! A pure function of the raw document at call time; performs no caching and
//! attaches no fingerprint. The raw block tree is flattened into one ordered
//! top-level sequence (a parent's own text before its children's, in source
//! order) and mapped into the closed [`ContentBlock`] set, with unknown kinds
//! preserved as `generic` when they carry extractable text and dropped
//! otherwise.

use crate::model::{ContentBlock, Links, MachineRepresentation, RawBlock};
use crate::store::RawDocument;
use serde_json::Value;

/// Build the machine representation of a raw document.
///
/// `categories` and `tags` are re-sorted ascending by id so the fingerprint
/// is deterministic regardless of the store's iteration order.
#[must_use]
pub fn build_mr(doc: &RawDocument, links: Links) -> MachineRepresentation {
    let mut categories = doc.categories.clone();
    categories.sort_by_key(|t| t.id);
    let mut tags = doc.tags.clone();
    tags.sort_by_key(|t| t.id);

    let blocks = extract_blocks(&doc.blocks);
    let core_content_text = flatten_text(&blocks);

    MachineRepresentation {
        rid: doc.rid,
        title: doc.title.clone(),
        status: doc.status.clone(),
        modified: doc.modified,
        published: doc.published,
        author: doc.author.clone(),
        image: doc.image.clone(),
        categories,
        tags,
        word_count: word_count(&core_content_text),
        core_content_text,
        blocks,
        links,
        cid: None,
    }
}

/// Flatten a raw block tree into an ordered `ContentBlock` sequence.
#[must_use]
pub fn extract_blocks(raw: &[RawBlock]) -> Vec<ContentBlock> {
    let mut out = Vec::new();
    for block in raw {
        map_block(block, &mut out);
    }
    out
}

/// Count whitespace-delimited tokens.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn map_block(block: &RawBlock, out: &mut Vec<ContentBlock>) {
    let text = collapse_ws(&strip_tags(&block.inner_html));
    match block.name.as_str() {
        "paragraph" => {
            if !text.is_empty() {
                out.push(ContentBlock::Paragraph { text });
            }
        }
        "heading" => {
            if !text.is_empty() {
                let level = attr_u64(&block.attrs, "level")
                    .unwrap_or(2)
                    .clamp(1, 6) as u8;
                out.push(ContentBlock::Heading { level, text });
            }
        }
        "list" => {
            let ordered = attr_bool(&block.attrs, "ordered")
                .unwrap_or_else(|| block.inner_html.contains("<ol"));
            let items = list_items(&block.inner_html);
            if !items.is_empty() {
                out.push(ContentBlock::List { ordered, items });
            }
        }
        "image" => {
            let id = attr_u64(&block.attrs, "id").unwrap_or(0);
            let alt_text = attr_str(&block.attrs, "alt").unwrap_or_default();
            let url = img_src(&block.inner_html);
            if id != 0 || url.is_some() || !alt_text.is_empty() {
                out.push(ContentBlock::Image { id, url, alt_text });
            }
        }
        "code" | "preformatted" => {
            if !text.is_empty() {
                out.push(ContentBlock::Code { text });
            }
        }
        "quote" => {
            if !text.is_empty() {
                out.push(ContentBlock::Quote { text });
            }
        }
        other => {
            if !text.is_empty() {
                let kind = if other.is_empty() { "unknown" } else { other };
                out.push(ContentBlock::Generic {
                    kind: kind.to_string(),
                    text,
                });
            }
        }
    }
    for child in &block.inner_blocks {
        map_block(child, out);
    }
}

/// Space-join every block's core text, decode HTML entities, collapse
/// whitespace.
fn flatten_text(blocks: &[ContentBlock]) -> String {
    let parts: Vec<String> = blocks.iter().filter_map(ContentBlock::core_text).collect();
    collapse_ws(&decode_entities(parts.join(" ").trim()))
}

fn attr_u64(attrs: &Value, key: &str) -> Option<u64> {
    attrs.get(key).and_then(Value::as_u64)
}

fn attr_bool(attrs: &Value, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

fn attr_str(attrs: &Value, key: &str) -> Option<String> {
    attrs.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Remove every `<...>` span from an HTML fragment.
pub(crate) fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the common named HTML entities plus numeric references.
pub(crate) fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';') {
            Some(semi) if semi > 1 && semi <= 10 => {
                let entity = &tail[1..semi];
                if let Some(decoded) = decode_entity(entity) {
                    out.push(decoded);
                } else {
                    out.push_str(&tail[..=semi]);
                }
                rest = &tail[semi + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        return u32::from_str_radix(num, 16).ok().and_then(char::from_u32);
    }
    if let Some(num) = entity.strip_prefix('#') {
        return num.parse::<u32>().ok().and_then(char::from_u32);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "hellip" => Some('…'),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "lsquo" => Some('\u{2018}'),
        "rsquo" => Some('\u{2019}'),
        "ldquo" => Some('\u{201c}'),
        "rdquo" => Some('\u{201d}'),
        _ => None,
    }
}

/// Escape text for embedding in a stored HTML fragment.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Extract the text of every `<li>` element, stripped and trimmed.
fn list_items(html: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut rest = html;
    while let Some(open) = rest.find("<li") {
        let after_open = &rest[open..];
        let Some(gt) = after_open.find('>') else { break };
        let body_start = &after_open[gt + 1..];
        let end = body_start.find("</li>").unwrap_or(body_start.len());
        let item = collapse_ws(&strip_tags(&body_start[..end]));
        if !item.is_empty() {
            items.push(item);
        }
        rest = &body_start[end..];
    }
    items
}

/// Extract the first `src="..."` attribute value from an HTML fragment.
fn img_src(html: &str) -> Option<String> {
    let idx = html.find("src=\"")?;
    let start = &html[idx + 5..];
    let end = start.find('"')?;
    let src = &start[..end];
    if src.is_empty() {
        None
    } else {
        Some(src.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Term};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(name: &str, attrs: Value, html: &str) -> RawBlock {
        RawBlock {
            name: name.into(),
            attrs,
            inner_html: html.into(),
            inner_blocks: Vec::new(),
        }
    }

    fn doc_with(blocks: Vec<RawBlock>) -> RawDocument {
        RawDocument {
            rid: 1,
            doc_type: "post".into(),
            title: "Report".into(),
            status: "draft".into(),
            modified: Utc::now(),
            published: Utc::now(),
            author: Author {
                id: 1,
                name: "Ana".into(),
                url: String::new(),
            },
            image: None,
            categories: vec![],
            tags: vec![],
            blocks,
        }
    }

    fn links() -> Links {
        Links {
            human_url: String::new(),
            api_url: String::new(),
            md_url: String::new(),
        }
    }

    #[test]
    fn paragraph_and_heading_mapping() {
        let blocks = extract_blocks(&[
            raw("paragraph", Value::Null, "<p>Hello <b>world</b></p>"),
            raw("heading", json!({"level": 3}), "<h3>Intro</h3>"),
            raw("heading", json!({"level": 9}), "<h1>Clamped</h1>"),
        ]);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Paragraph {
                    text: "Hello world".into()
                },
                ContentBlock::Heading {
                    level: 3,
                    text: "Intro".into()
                },
                ContentBlock::Heading {
                    level: 6,
                    text: "Clamped".into()
                },
            ]
        );
    }

    #[test]
    fn empty_blocks_are_dropped() {
        let blocks = extract_blocks(&[
            raw("paragraph", Value::Null, "<p>   </p>"),
            raw("heading", json!({"level": 2}), ""),
            raw("list", Value::Null, "<ul></ul>"),
            raw("separator", Value::Null, "<hr/>"),
        ]);
        assert!(blocks.is_empty());
    }

    #[test]
    fn list_items_and_ordered_detection() {
        let blocks = extract_blocks(&[raw(
            "list",
            Value::Null,
            "<ol><li>first</li><li>second <i>x</i></li></ol>",
        )]);
        assert_eq!(
            blocks,
            vec![ContentBlock::List {
                ordered: true,
                items: vec!["first".into(), "second x".into()]
            }]
        );
    }

    #[test]
    fn image_src_and_attrs() {
        let blocks = extract_blocks(&[raw(
            "image",
            json!({"id": 42, "alt": "diagram"}),
            r#"<figure><img src="http://x/d.png" alt="diagram"/></figure>"#,
        )]);
        assert_eq!(
            blocks,
            vec![ContentBlock::Image {
                id: 42,
                url: Some("http://x/d.png".into()),
                alt_text: "diagram".into()
            }]
        );
    }

    #[test]
    fn unknown_kind_with_text_becomes_generic() {
        let blocks = extract_blocks(&[raw("pullquote", Value::Null, "<p>quoted</p>")]);
        assert_eq!(
            blocks,
            vec![ContentBlock::Generic {
                kind: "pullquote".into(),
                text: "quoted".into()
            }]
        );
    }

    #[test]
    fn nested_blocks_flatten_parent_first() {
        let mut group = raw("group", Value::Null, "");
        group.inner_blocks = vec![
            raw("paragraph", Value::Null, "<p>child one</p>"),
            raw("paragraph", Value::Null, "<p>child two</p>"),
        ];
        let blocks = extract_blocks(&[raw("paragraph", Value::Null, "<p>before</p>"), group]);
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            ContentBlock::Paragraph {
                text: "child one".into()
            }
        );
    }

    #[test]
    fn core_text_decodes_entities_and_counts_words() {
        let doc = doc_with(vec![
            raw("paragraph", Value::Null, "<p>Fish &amp; chips</p>"),
            raw("list", Value::Null, "<ul><li>one</li><li>two</li></ul>"),
        ]);
        let mr = build_mr(&doc, links());
        assert_eq!(mr.core_content_text, "Fish & chips one two");
        assert_eq!(mr.word_count, 5);
    }

    #[test]
    fn taxonomy_sorted_by_id() {
        let term = |id: u64, name: &str| Term {
            id,
            name: name.into(),
            slug: name.into(),
            url: String::new(),
        };
        let mut doc = doc_with(vec![]);
        doc.categories = vec![term(9, "z"), term(2, "a")];
        doc.tags = vec![term(5, "t"), term(1, "s")];
        let mr = build_mr(&doc, links());
        assert_eq!(mr.categories[0].id, 2);
        assert_eq!(mr.tags[0].id, 1);
    }

    #[test]
    fn entity_decoding_table() {
        assert_eq!(decode_entities("a &amp; b &#8212; c"), "a & b — c");
        assert_eq!(decode_entities("&#x41;&hellip;"), "A…");
        assert_eq!(decode_entities("5 &lt; 6 &unknown; &"), "5 < 6 &unknown; &");
    }

    #[test]
    fn escape_round_trips_through_strip_and_decode() {
        let text = "a < b & \"c\"";
        let html = format!("<p>{}</p>", escape_html(text));
        assert_eq!(decode_entities(&strip_tags(&html)), text);
    }
}
