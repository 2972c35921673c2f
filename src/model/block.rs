//! Typed content blocks and the raw source-block tree.
//!
//! [`ContentBlock`] is the closed set of normalized block variants emitted in
//! a machine representation, with [`ContentBlock::Generic`] as the catch-all
//! for unknown source kinds that still carry text. [`RawBlock`] is the shape
//! the document store supplies: a nested tree of named nodes with attributes
//! and an HTML fragment, which the builder flattens into an ordered
//! `ContentBlock` sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One normalized unit of document content.
///
/// Blocks are emitted in document order; nested source structures are
/// flattened, so hierarchy is not preserved, only order. A block with no
/// extractable text and no items is never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// A paragraph of plain text.
    Paragraph { text: String },
    /// A heading with level 1..=6.
    Heading { level: u8, text: String },
    /// An ordered or unordered list.
    List { ordered: bool, items: Vec<String> },
    /// An image reference.
    Image {
        id: u64,
        url: Option<String>,
        alt_text: String,
    },
    /// Preformatted or code content.
    Code { text: String },
    /// A block quotation.
    Quote { text: String },
    /// Any source kind outside the closed set that still carries text.
    Generic { kind: String, text: String },
}

impl ContentBlock {
    /// The text this block contributes to the flattened core text.
    ///
    /// Lists contribute their items joined by single spaces; images
    /// contribute nothing.
    #[must_use]
    pub fn core_text(&self) -> Option<String> {
        match self {
            ContentBlock::Paragraph { text }
            | ContentBlock::Code { text }
            | ContentBlock::Quote { text }
            | ContentBlock::Heading { text, .. }
            | ContentBlock::Generic { text, .. } => {
                if text.is_empty() {
                    None
                } else {
                    Some(text.clone())
                }
            }
            ContentBlock::List { items, .. } => {
                if items.is_empty() {
                    None
                } else {
                    Some(items.join(" "))
                }
            }
            ContentBlock::Image { .. } => None,
        }
    }
}

/// A source content node as supplied by the document store.
///
/// Mirrors the store's parsed block grammar: a kind name, a free-form
/// attribute object, the raw inner HTML fragment, and nested child blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    /// Source block kind (e.g. `paragraph`, `heading`, `gallery`).
    pub name: String,
    /// Kind-specific attributes (`level`, `ordered`, `id`, `alt`, ...).
    #[serde(default)]
    pub attrs: Value,
    /// Raw inner HTML of this node, excluding children.
    #[serde(default)]
    pub inner_html: String,
    /// Nested child blocks, in source order.
    #[serde(default)]
    pub inner_blocks: Vec<RawBlock>,
}

impl RawBlock {
    /// Convenience constructor for a leaf block with no attributes.
    #[must_use]
    pub fn leaf(name: &str, inner_html: &str) -> Self {
        RawBlock {
            name: name.to_string(),
            attrs: Value::Null,
            inner_html: inner_html.to_string(),
            inner_blocks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blocks_serialize_with_type_tag() {
        let block = ContentBlock::Heading {
            level: 2,
            text: "Summary".into(),
        };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v, json!({"type": "heading", "level": 2, "text": "Summary"}));
    }

    #[test]
    fn block_payloads_deserialize_from_tagged_json() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "paragraph", "text": "Hello"})).unwrap();
        assert_eq!(
            block,
            ContentBlock::Paragraph {
                text: "Hello".into()
            }
        );
        let unknown = serde_json::from_value::<ContentBlock>(json!({"type": "video", "src": "x"}));
        assert!(unknown.is_err());
    }

    #[test]
    fn core_text_per_variant() {
        let list = ContentBlock::List {
            ordered: false,
            items: vec!["a".into(), "b".into()],
        };
        assert_eq!(list.core_text().as_deref(), Some("a b"));

        let image = ContentBlock::Image {
            id: 3,
            url: Some("http://x/i.png".into()),
            alt_text: "alt".into(),
        };
        assert_eq!(image.core_text(), None);

        let empty = ContentBlock::Paragraph { text: String::new() };
        assert_eq!(empty.core_text(), None);
    }

    #[test]
    fn raw_block_defaults() {
        let raw: RawBlock = serde_json::from_value(json!({"name": "paragraph"})).unwrap();
        assert_eq!(raw.inner_html, "");
        assert!(raw.inner_blocks.is_empty());
        assert!(raw.attrs.is_null());
    }
}
