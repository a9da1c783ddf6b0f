//! In-memory library source
//!
//! Holds items, collections and attachments in ordered maps. Loaded from a
//! JSON snapshot (`ZOTERO_LIBRARY_JSON`) or built programmatically.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use super::error::Result;
use super::traits::{ItemPage, LibrarySource};
use super::types::{Attachment, Collection, CollectionId, ItemId, LibraryId, LibraryItem};
use super::zotero::{is_listable_item_type, resolve_attachment_path};

/// Serialized form of a whole library
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySnapshot {
    #[serde(rename = "libraryID", default = "default_library_id")]
    pub library_id: LibraryId,
    /// Profile directory used to resolve `storage:` paths
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub items: Vec<LibraryItem>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

fn default_library_id() -> LibraryId {
    1
}

#[derive(Default)]
struct Store {
    items: BTreeMap<ItemId, LibraryItem>,
    item_keys: HashMap<String, ItemId>,
    collections: BTreeMap<CollectionId, Collection>,
    collection_keys: HashMap<String, CollectionId>,
    attachments: HashMap<ItemId, Attachment>,
}

/// Library source backed by memory
pub struct MemoryLibrary {
    library_id: LibraryId,
    data_dir: PathBuf,
    store: RwLock<Store>,
}

impl MemoryLibrary {
    /// Create an empty library
    pub fn new(library_id: LibraryId) -> Self {
        Self {
            library_id,
            data_dir: PathBuf::new(),
            store: RwLock::new(Store::default()),
        }
    }

    /// Build a library from a snapshot
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Self {
        let mut library = Self::new(snapshot.library_id);
        if let Some(dir) = snapshot.data_dir {
            library.data_dir = dir;
        }
        for item in snapshot.items {
            library.insert_item(item);
        }
        for collection in snapshot.collections {
            library.insert_collection(collection);
        }
        for attachment in snapshot.attachments {
            library.insert_attachment(attachment);
        }
        library
    }

    /// Load a snapshot file
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let snapshot: LibrarySnapshot = serde_json::from_slice(&data)?;
        tracing::info!(
            "Loaded library snapshot {} ({} items, {} collections)",
            path.display(),
            snapshot.items.len(),
            snapshot.collections.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn insert_item(&self, item: LibraryItem) {
        let mut store = self.store.write();
        store.item_keys.insert(item.key.clone(), item.id);
        store.items.insert(item.id, item);
    }

    pub fn insert_collection(&self, collection: Collection) {
        let mut store = self.store.write();
        store
            .collection_keys
            .insert(collection.key.clone(), collection.id);
        store.collections.insert(collection.id, collection);
    }

    pub fn insert_attachment(&self, attachment: Attachment) {
        self.store.write().attachments.insert(attachment.id, attachment);
    }

    pub fn item_count(&self) -> usize {
        self.store.read().items.len()
    }
}

#[async_trait]
impl LibrarySource for MemoryLibrary {
    fn library_id(&self) -> LibraryId {
        self.library_id
    }

    async fn item_by_key(&self, key: &str) -> Result<Option<LibraryItem>> {
        let store = self.store.read();
        Ok(store
            .item_keys
            .get(key)
            .and_then(|id| store.items.get(id))
            .cloned())
    }

    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<LibraryItem>> {
        let store = self.store.read();
        Ok(ids
            .iter()
            .filter_map(|id| store.items.get(id).cloned())
            .collect())
    }

    async fn list_items(&self, offset: usize, limit: usize) -> Result<ItemPage> {
        let store = self.store.read();
        let listable: Vec<&LibraryItem> = store
            .items
            .values()
            .filter(|item| is_listable_item_type(&item.item_type))
            .collect();

        Ok(ItemPage {
            total: listable.len(),
            items: listable
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        })
    }

    async fn attachment(&self, id: ItemId) -> Result<Option<Attachment>> {
        Ok(self.store.read().attachments.get(&id).cloned())
    }

    async fn attachment_file_path(&self, attachment: &Attachment) -> Result<Option<PathBuf>> {
        Ok(resolve_attachment_path(&self.data_dir, None, attachment))
    }

    async fn collection_by_key(&self, key: &str) -> Result<Option<Collection>> {
        let store = self.store.read();
        Ok(store
            .collection_keys
            .get(key)
            .and_then(|id| store.collections.get(id))
            .cloned())
    }

    async fn collections_by_ids(&self, ids: &[CollectionId]) -> Result<Vec<Collection>> {
        let store = self.store.read();
        Ok(ids
            .iter()
            .filter_map(|id| store.collections.get(id).cloned())
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.store.read().collections.values().cloned().collect())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_library;
    use super::*;

    #[tokio::test]
    async fn test_items_by_ids_preserves_order_and_skips_unknown() {
        let library = sample_library();
        let items = library.items_by_ids(&[103, 999, 101]).await.unwrap();
        let keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["ITEM0003", "ITEM0001"]);
    }

    #[tokio::test]
    async fn test_list_items_skips_attachments_and_windows() {
        let library = sample_library();

        let page = library.list_items(0, 100).await.unwrap();
        assert_eq!(page.total, 8);
        assert!(page.items.iter().all(|i| i.item_type != "attachment"));

        let page = library.list_items(6, 5).await.unwrap();
        assert_eq!(page.total, 8);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_by_key() {
        let library = sample_library();
        assert!(library.item_by_key("ABCD1234").await.unwrap().is_some());
        assert!(library.item_by_key("NOPE0000").await.unwrap().is_none());
        assert_eq!(
            library.collection_by_key("COLL002").await.unwrap().unwrap().parent_key.as_deref(),
            Some("COLL001")
        );
    }

    #[tokio::test]
    async fn test_load_json_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(
            &path,
            r#"{
                "libraryID": 3,
                "dataDir": "/zotero",
                "items": [{"id": 1, "key": "ABCD1234", "libraryID": 3, "itemType": "book", "attachments": [2]}],
                "attachments": [{"id": 2, "key": "PDF00002", "contentType": "application/pdf",
                                 "linkMode": "imported_file", "path": "storage:paper.pdf"}],
                "collections": [{"id": 1, "key": "COLL001", "libraryID": 3, "name": "Inbox"}]
            }"#,
        )
        .unwrap();

        let library = MemoryLibrary::load_json(&path).await.unwrap();
        assert_eq!(library.library_id(), 3);
        assert_eq!(library.item_count(), 1);

        let attachment = library.attachment(2).await.unwrap().unwrap();
        assert_eq!(
            library.attachment_file_path(&attachment).await.unwrap(),
            Some(PathBuf::from("/zotero/storage/PDF00002/paper.pdf"))
        );
    }

    #[tokio::test]
    async fn test_load_json_rejects_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = MemoryLibrary::load_json(&path).await;
        assert!(matches!(result, Err(crate::library::LibraryError::Snapshot(_))));
    }
}
