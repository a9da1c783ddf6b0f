//! Library traits
//!
//! Narrow capability interfaces the formatters and services depend on, and the
//! async data-source seam implemented by each adapter.

use std::path::PathBuf;

use async_trait::async_trait;

use super::error::Result;
use super::types::{Attachment, Collection, CollectionId, ItemId, LibraryId, LibraryItem};

/// Anything with a stable key and a sync version
pub trait HasKeyAndVersion {
    fn key(&self) -> &str;
    fn version(&self) -> i64;
    fn library_id(&self) -> LibraryId;
}

/// Anything that can own attachment children
pub trait HasAttachments {
    /// Attachment ids in library order
    fn attachment_ids(&self) -> &[ItemId];
}

/// Anything with child items and child collections
pub trait HasChildCollections {
    fn child_item_ids(&self) -> &[ItemId];
    fn child_collection_ids(&self) -> &[CollectionId];
}

impl HasKeyAndVersion for LibraryItem {
    fn key(&self) -> &str {
        &self.key
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn library_id(&self) -> LibraryId {
        self.library_id
    }
}

impl HasAttachments for LibraryItem {
    fn attachment_ids(&self) -> &[ItemId] {
        &self.attachments
    }
}

impl HasKeyAndVersion for Collection {
    fn key(&self) -> &str {
        &self.key
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn library_id(&self) -> LibraryId {
        self.library_id
    }
}

impl HasChildCollections for Collection {
    fn child_item_ids(&self) -> &[ItemId] {
        &self.child_item_ids
    }

    fn child_collection_ids(&self) -> &[CollectionId] {
        &self.child_collection_ids
    }
}

/// One page of an item listing
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<LibraryItem>,
    /// Total number of listable items, independent of the page window
    pub total: usize,
}

/// Read-only access to a library
///
/// Implementations may be backed by live data that changes between calls;
/// callers must not assume two calls observe the same snapshot.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// The library all lookups are scoped to
    fn library_id(&self) -> LibraryId;

    /// Look up an item by key
    async fn item_by_key(&self, key: &str) -> Result<Option<LibraryItem>>;

    /// Batch lookup; result follows `ids` order and skips unknown ids
    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<LibraryItem>>;

    /// List regular items with an offset/limit window
    async fn list_items(&self, offset: usize, limit: usize) -> Result<ItemPage>;

    /// Look up an attachment by item id
    async fn attachment(&self, id: ItemId) -> Result<Option<Attachment>>;

    /// Resolve the file backing an attachment, `None` when there is none
    async fn attachment_file_path(&self, attachment: &Attachment) -> Result<Option<PathBuf>>;

    /// Look up a collection by key
    async fn collection_by_key(&self, key: &str) -> Result<Option<Collection>>;

    /// Batch lookup; result follows `ids` order and skips unknown ids
    async fn collections_by_ids(&self, ids: &[CollectionId]) -> Result<Vec<Collection>>;

    /// All collections in the library
    async fn list_collections(&self) -> Result<Vec<Collection>>;
}
