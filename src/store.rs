//! Collaborator boundary to the raw document store.
//!
//! The store is the single authoritative home of document state. It must
//! supply, per resource: an existence check (a `None` from [`DocumentStore::load`]),
//! metadata, the raw nested block tree, and an atomic mutation primitive that
//! replaces content and reports failure without partial effect. Everything
//! above this trait treats documents as read-only snapshots.

use crate::error::{DualNativeError, Result};
use crate::model::{Author, FeaturedImage, RawBlock, Term};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A document exactly as the backing store holds it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub rid: u64,
    /// Store-level document type (e.g. `post`, `page`).
    pub doc_type: String,
    pub title: String,
    /// `draft` or `publish`.
    pub status: String,
    pub modified: DateTime<Utc>,
    pub published: DateTime<Utc>,
    pub author: Author,
    pub image: Option<FeaturedImage>,
    pub categories: Vec<Term>,
    pub tags: Vec<Term>,
    /// Raw nested block tree, in source order.
    pub blocks: Vec<RawBlock>,
}

/// Status filter for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    Draft,
    Publish,
    #[default]
    Any,
}

impl StatusFilter {
    /// Parse the catalog query value; anything unrecognized means `Any`.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("draft") => StatusFilter::Draft,
            Some("publish") => StatusFilter::Publish,
            _ => StatusFilter::Any,
        }
    }

    fn accepts(self, status: &str) -> bool {
        match self {
            StatusFilter::Draft => status == "draft",
            StatusFilter::Publish => status == "publish",
            StatusFilter::Any => true,
        }
    }
}

/// Filter for catalog listings.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    /// Only documents modified strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    pub status: StatusFilter,
    /// Document types to include; empty means all.
    pub types: Vec<String>,
}

impl CatalogFilter {
    fn accepts(&self, doc: &RawDocument) -> bool {
        if let Some(since) = self.since {
            if doc.modified <= since {
                return false;
            }
        }
        if !self.status.accepts(&doc.status) {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| t == &doc.doc_type) {
            return false;
        }
        true
    }
}

/// Abstraction over the authoritative document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Load a document snapshot, or `None` when it does not exist.
    async fn load(&self, rid: u64) -> Result<Option<RawDocument>>;

    /// Atomically replace a document's block tree, bumping its modified
    /// timestamp. Fails with no partial effect.
    async fn replace_blocks(&self, rid: u64, blocks: Vec<RawBlock>) -> Result<()>;

    /// List documents matching the filter, most-recently-modified first.
    async fn list(&self, filter: &CatalogFilter) -> Result<Vec<RawDocument>>;
}

/// In-memory document store used by tests and the demo server.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<u64, RawDocument>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore::default())
    }

    /// Insert or overwrite a document snapshot.
    pub fn insert(&self, doc: RawDocument) {
        self.documents.lock().insert(doc.rid, doc);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, rid: u64) -> Result<Option<RawDocument>> {
        Ok(self.documents.lock().get(&rid).cloned())
    }

    async fn replace_blocks(&self, rid: u64, blocks: Vec<RawBlock>) -> Result<()> {
        let mut documents = self.documents.lock();
        let doc = documents.get_mut(&rid).ok_or(DualNativeError::NotFound)?;
        doc.blocks = blocks;
        doc.modified = Utc::now();
        Ok(())
    }

    async fn list(&self, filter: &CatalogFilter) -> Result<Vec<RawDocument>> {
        let documents = self.documents.lock();
        let mut matched: Vec<RawDocument> = documents
            .values()
            .filter(|doc| filter.accepts(doc))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(rid: u64, status: &str, doc_type: &str, modified: &str) -> RawDocument {
        RawDocument {
            rid,
            doc_type: doc_type.into(),
            title: format!("doc {rid}"),
            status: status.into(),
            modified: modified.parse().unwrap(),
            published: modified.parse().unwrap(),
            author: Author {
                id: 1,
                name: "Ana".into(),
                url: String::new(),
            },
            image: None,
            categories: vec![],
            tags: vec![],
            blocks: vec![],
        }
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.load(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_blocks_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.replace_blocks(99, vec![]).await.unwrap_err();
        assert!(matches!(err, DualNativeError::NotFound));
    }

    #[tokio::test]
    async fn replace_blocks_bumps_modified() {
        let store = MemoryStore::new();
        store.insert(doc(1, "draft", "post", "2020-01-01T00:00:00Z"));
        let before = store.load(1).await.unwrap().unwrap().modified;
        store
            .replace_blocks(1, vec![RawBlock::leaf("paragraph", "<p>x</p>")])
            .await
            .unwrap();
        let after = store.load(1).await.unwrap().unwrap();
        assert!(after.modified > before);
        assert_eq!(after.blocks.len(), 1);
    }

    #[tokio::test]
    async fn list_orders_by_modified_desc_and_filters() {
        let store = MemoryStore::new();
        store.insert(doc(1, "draft", "post", "2026-01-01T00:00:00Z"));
        store.insert(doc(2, "publish", "post", "2026-03-01T00:00:00Z"));
        store.insert(doc(3, "publish", "page", "2026-02-01T00:00:00Z"));

        let all = store.list(&CatalogFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|d| d.rid).collect::<Vec<_>>(), vec![2, 3, 1]);

        let published = store
            .list(&CatalogFilter {
                status: StatusFilter::Publish,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(published.len(), 2);

        let pages = store
            .list(&CatalogFilter {
                types: vec!["page".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pages[0].rid, 3);

        let recent = store
            .list(&CatalogFilter {
                since: Some("2026-01-15T00:00:00Z".parse().unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
    }
}
