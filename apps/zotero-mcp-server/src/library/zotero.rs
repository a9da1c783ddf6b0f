//! Zotero profile database source
//!
//! Reads `zotero.sqlite` in immutable read-only mode so a running Zotero
//! instance keeps its lock and nothing here can write. Attachment files are
//! resolved against the profile's `storage/` directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::error::{LibraryError, Result};
use super::traits::{ItemPage, LibrarySource};
use super::types::{
    Attachment, Collection, CollectionId, Creator, ItemId, LibraryId, LibraryItem, LinkMode,
    Relations,
};

const DATABASE_FILE: &str = "zotero.sqlite";
const STORAGE_DIR: &str = "storage";
const STORAGE_PREFIX: &str = "storage:";
const BASE_DIR_PREFIX: &str = "attachments:";

/// Item types that are children or annotations, never listed on their own
const CHILD_ITEM_TYPES: [&str; 3] = ["attachment", "note", "annotation"];

/// Fields that stand in for `title` on some item types
const TITLE_FIELDS: [&str; 4] = ["title", "caseName", "nameOfAct", "subject"];

/// Whether an item type shows up in item listings
pub(crate) fn is_listable_item_type(item_type: &str) -> bool {
    !CHILD_ITEM_TYPES.contains(&item_type)
}

/// Resolve the stored path of an attachment to a filesystem path
///
/// - `storage:name` lives in `<data_dir>/storage/<key>/name`
/// - `attachments:rel` is relative to the linked-attachment base directory
/// - anything else on a linked file is taken as an absolute path
///
/// Linked URLs never have a file.
pub(crate) fn resolve_attachment_path(
    data_dir: &Path,
    base_dir: Option<&Path>,
    attachment: &Attachment,
) -> Option<PathBuf> {
    if attachment.link_mode == LinkMode::LinkedUrl {
        return None;
    }
    let stored = attachment.path.as_deref().filter(|p| !p.is_empty())?;

    if let Some(name) = stored.strip_prefix(STORAGE_PREFIX) {
        return Some(data_dir.join(STORAGE_DIR).join(&attachment.key).join(name));
    }
    if let Some(relative) = stored.strip_prefix(BASE_DIR_PREFIX) {
        return base_dir.map(|base| base.join(relative));
    }
    Some(PathBuf::from(stored))
}

/// Zotero stores dates as `YYYY-MM-DD original`; keep what the user typed
fn display_date(stored: String) -> String {
    match stored.split_once(' ') {
        Some((sql, original)) if sql.len() == 10 && sql.as_bytes()[4] == b'-' => {
            original.to_string()
        }
        _ => stored,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    key: String,
    library_id: i64,
    version: i64,
    item_type: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CreatorRow {
    creator_type: String,
    first_name: Option<String>,
    last_name: Option<String>,
    field_mode: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    key: String,
    content_type: Option<String>,
    link_mode: Option<i64>,
    path: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct CollectionRow {
    id: i64,
    key: String,
    library_id: i64,
    version: i64,
    name: String,
    parent_key: Option<String>,
}

const ITEM_COLUMNS: &str = r#"
    SELECT i.itemID AS id, i.key AS key, i.libraryID AS library_id,
           i.version AS version, t.typeName AS item_type
    FROM items i
    JOIN itemTypes t ON t.itemTypeID = i.itemTypeID
"#;

const COLLECTION_COLUMNS: &str = r#"
    SELECT c.collectionID AS id, c.key AS key, c.libraryID AS library_id,
           c.version AS version, c.collectionName AS name, p.key AS parent_key
    FROM collections c
    LEFT JOIN collections p ON p.collectionID = c.parentCollectionID
"#;

/// Library source over a Zotero profile directory
pub struct ZoteroDatabase {
    pool: SqlitePool,
    data_dir: PathBuf,
    base_dir: Option<PathBuf>,
    library_id: LibraryId,
}

impl ZoteroDatabase {
    /// Open the profile in `data_dir` (the directory holding `zotero.sqlite`)
    pub async fn open(data_dir: impl Into<PathBuf>, base_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let database = data_dir.join(DATABASE_FILE);
        if !tokio::fs::try_exists(&database).await? {
            return Err(LibraryError::Unavailable(format!(
                "{} does not exist",
                database.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&database)
            .read_only(true)
            .immutable(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let library_id: Option<i64> =
            sqlx::query_scalar("SELECT libraryID FROM libraries WHERE type = 'user' LIMIT 1")
                .fetch_optional(&pool)
                .await?;
        let library_id = library_id.unwrap_or(1);

        tracing::info!(
            "Opened Zotero database {} (user library {})",
            database.display(),
            library_id
        );

        Ok(Self {
            pool,
            data_dir,
            base_dir,
            library_id,
        })
    }

    async fn item_by_id(&self, id: ItemId) -> Result<Option<LibraryItem>> {
        let sql = format!(
            "{ITEM_COLUMNS} WHERE i.itemID = ? AND i.libraryID = ? \
             AND i.itemID NOT IN (SELECT itemID FROM deletedItems)"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .bind(self.library_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_item(row).await?)),
            None => Ok(None),
        }
    }

    /// Fill in fields, creators, tags and relations for an item row
    async fn hydrate_item(&self, row: ItemRow) -> Result<LibraryItem> {
        let mut item = LibraryItem::new(row.id, &row.key, row.library_id, &row.item_type);
        item.version = row.version;

        let fields: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT f.fieldName, CAST(v.value AS TEXT)
            FROM itemData d
            JOIN fields f ON f.fieldID = d.fieldID
            JOIN itemDataValues v ON v.valueID = d.valueID
            WHERE d.itemID = ?
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        let mut fields: BTreeMap<String, String> = fields.into_iter().collect();

        item.title = TITLE_FIELDS
            .iter()
            .find_map(|name| fields.remove(*name))
            .unwrap_or_default();
        item.date = fields.remove("date").map(display_date);
        item.fields = fields;

        let creators = sqlx::query_as::<_, CreatorRow>(
            r#"
            SELECT ct.creatorType AS creator_type, c.firstName AS first_name,
                   c.lastName AS last_name, c.fieldMode AS field_mode
            FROM itemCreators ic
            JOIN creators c ON c.creatorID = ic.creatorID
            JOIN creatorTypes ct ON ct.creatorTypeID = ic.creatorTypeID
            WHERE ic.itemID = ?
            ORDER BY ic.orderIndex
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        item.creators = creators
            .into_iter()
            .map(|c| {
                if c.field_mode == Some(1) {
                    Creator::single(&c.creator_type, c.last_name.as_deref().unwrap_or_default())
                } else {
                    Creator {
                        creator_type: c.creator_type,
                        first_name: c.first_name,
                        last_name: c.last_name,
                        name: None,
                    }
                }
            })
            .collect();

        item.tags = sqlx::query_scalar(
            r#"
            SELECT t.name FROM itemTags it
            JOIN tags t ON t.tagID = it.tagID
            WHERE it.itemID = ?
            ORDER BY t.name
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        item.collections = sqlx::query_scalar(
            r#"
            SELECT c.key FROM collectionItems ci
            JOIN collections c ON c.collectionID = ci.collectionID
            WHERE ci.itemID = ?
            ORDER BY c.key
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        item.parent_item = sqlx::query_scalar(
            r#"
            SELECT p.key FROM itemAttachments a JOIN items p ON p.itemID = a.parentItemID
            WHERE a.itemID = ?1
            UNION
            SELECT p.key FROM itemNotes n JOIN items p ON p.itemID = n.parentItemID
            WHERE n.itemID = ?1
            "#,
        )
        .bind(row.id)
        .fetch_optional(&self.pool)
        .await?;

        item.attachments = sqlx::query_scalar(
            r#"
            SELECT a.itemID FROM itemAttachments a
            WHERE a.parentItemID = ?
              AND a.itemID NOT IN (SELECT itemID FROM deletedItems)
            ORDER BY a.itemID
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let relations: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT rp.predicate, r.object FROM itemRelations r
            JOIN relationPredicates rp ON rp.predicateID = r.predicateID
            WHERE r.itemID = ?
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        item.relations = group_relations(relations);

        Ok(item)
    }

    async fn collection_by_id(&self, id: CollectionId) -> Result<Option<Collection>> {
        let sql = format!(
            "{COLLECTION_COLUMNS} WHERE c.collectionID = ? AND c.libraryID = ? \
             AND c.collectionID NOT IN (SELECT collectionID FROM deletedCollections)"
        );
        let row = sqlx::query_as::<_, CollectionRow>(&sql)
            .bind(id)
            .bind(self.library_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_collection(row).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate_collection(&self, row: CollectionRow) -> Result<Collection> {
        let mut collection = Collection::new(row.id, &row.key, row.library_id, &row.name);
        collection.version = row.version;
        collection.parent_key = row.parent_key;

        collection.child_item_ids = sqlx::query_scalar(
            r#"
            SELECT ci.itemID FROM collectionItems ci
            WHERE ci.collectionID = ?
              AND ci.itemID NOT IN (SELECT itemID FROM deletedItems)
            ORDER BY ci.orderIndex, ci.itemID
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        collection.child_collection_ids = sqlx::query_scalar(
            r#"
            SELECT collectionID FROM collections
            WHERE parentCollectionID = ?
              AND collectionID NOT IN (SELECT collectionID FROM deletedCollections)
            ORDER BY collectionName
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let relations: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT rp.predicate, r.object FROM collectionRelations r
            JOIN relationPredicates rp ON rp.predicateID = r.predicateID
            WHERE r.collectionID = ?
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        collection.relations = group_relations(relations);

        Ok(collection)
    }
}

fn group_relations(pairs: Vec<(String, String)>) -> Relations {
    let mut relations = Relations::new();
    for (predicate, object) in pairs {
        relations.entry(predicate).or_default().push(object);
    }
    relations
}

#[async_trait]
impl LibrarySource for ZoteroDatabase {
    fn library_id(&self) -> LibraryId {
        self.library_id
    }

    async fn item_by_key(&self, key: &str) -> Result<Option<LibraryItem>> {
        tracing::debug!("Looking up item '{}'", key);
        let sql = format!(
            "{ITEM_COLUMNS} WHERE i.libraryID = ? AND i.key = ? \
             AND i.itemID NOT IN (SELECT itemID FROM deletedItems)"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(self.library_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_item(row).await?)),
            None => Ok(None),
        }
    }

    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<LibraryItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.item_by_id(*id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn list_items(&self, offset: usize, limit: usize) -> Result<ItemPage> {
        let filter = r#"
            WHERE i.libraryID = ?
              AND t.typeName NOT IN ('attachment', 'note', 'annotation')
              AND i.itemID NOT IN (SELECT itemID FROM deletedItems)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM items i JOIN itemTypes t ON t.itemTypeID = i.itemTypeID {filter}"
        ))
        .bind(self.library_id)
        .fetch_one(&self.pool)
        .await?;
        let total = usize::try_from(total).unwrap_or_default();

        // SQLite reads a negative OFFSET as 0
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(ItemPage {
                items: Vec::new(),
                total,
            });
        };

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "{ITEM_COLUMNS} {filter} ORDER BY i.itemID LIMIT ? OFFSET ?"
        ))
        .bind(self.library_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.hydrate_item(row).await?);
        }

        Ok(ItemPage { items, total })
    }

    async fn attachment(&self, id: ItemId) -> Result<Option<Attachment>> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT a.itemID AS id, i.key AS key, a.contentType AS content_type,
                   a.linkMode AS link_mode, a.path AS path
            FROM itemAttachments a
            JOIN items i ON i.itemID = a.itemID
            WHERE a.itemID = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let Some(link_mode) = row.link_mode.and_then(LinkMode::from_code) else {
                tracing::warn!("Attachment {} has unknown link mode {:?}", row.key, row.link_mode);
                return None;
            };
            Some(Attachment {
                id: row.id,
                key: row.key,
                content_type: row.content_type,
                link_mode,
                path: row.path,
            })
        }))
    }

    async fn attachment_file_path(&self, attachment: &Attachment) -> Result<Option<PathBuf>> {
        let Some(path) =
            resolve_attachment_path(&self.data_dir, self.base_dir.as_deref(), attachment)
        else {
            return Ok(None);
        };

        if tokio::fs::try_exists(&path).await? {
            Ok(Some(path))
        } else {
            tracing::debug!("Attachment {} file missing at {}", attachment.key, path.display());
            Ok(None)
        }
    }

    async fn collection_by_key(&self, key: &str) -> Result<Option<Collection>> {
        let sql = format!(
            "{COLLECTION_COLUMNS} WHERE c.libraryID = ? AND c.key = ? \
             AND c.collectionID NOT IN (SELECT collectionID FROM deletedCollections)"
        );
        let row = sqlx::query_as::<_, CollectionRow>(&sql)
            .bind(self.library_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_collection(row).await?)),
            None => Ok(None),
        }
    }

    async fn collections_by_ids(&self, ids: &[CollectionId]) -> Result<Vec<Collection>> {
        let mut collections = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(collection) = self.collection_by_id(*id).await? {
                collections.push(collection);
            }
        }
        Ok(collections)
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let sql = format!(
            "{COLLECTION_COLUMNS} WHERE c.libraryID = ? \
             AND c.collectionID NOT IN (SELECT collectionID FROM deletedCollections) \
             ORDER BY c.collectionName"
        );
        let rows = sqlx::query_as::<_, CollectionRow>(&sql)
            .bind(self.library_id)
            .fetch_all(&self.pool)
            .await?;

        let mut collections = Vec::with_capacity(rows.len());
        for row in rows {
            collections.push(self.hydrate_collection(row).await?);
        }
        Ok(collections)
    }
}
