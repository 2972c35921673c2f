//! The machine representation (MR) of a document snapshot.

use crate::model::ContentBlock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document author identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
    pub url: String,
}

/// Featured image metadata, when the document carries one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedImage {
    pub id: u64,
    pub url: String,
    pub alt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One taxonomy term (category or tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub url: String,
}

/// Derived URLs for a resource. Excluded from fingerprinting: they vary with
/// deployment, not with content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub human_url: String,
    pub api_url: String,
    pub md_url: String,
}

/// Structured, agent-consumable snapshot of a document.
///
/// Field order here is the wire order; fingerprinting goes through the
/// canonical encoder instead and never depends on it. `categories` and `tags`
/// are sorted ascending by id so the fingerprint is stable regardless of
/// upstream iteration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRepresentation {
    /// Resource id.
    pub rid: u64,
    pub title: String,
    pub status: String,
    pub modified: DateTime<Utc>,
    pub published: DateTime<Utc>,
    pub author: Author,
    pub image: Option<FeaturedImage>,
    pub categories: Vec<Term>,
    pub tags: Vec<Term>,
    pub word_count: usize,
    /// Flattened, whitespace-normalized, entity-decoded text of every block.
    pub core_content_text: String,
    pub blocks: Vec<ContentBlock>,
    pub links: Links,
    /// Content fingerprint, attached after computation; excluded from its
    /// own hash input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

impl MachineRepresentation {
    /// Texts of every heading block, in document order.
    #[must_use]
    pub fn heading_texts(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Heading { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
