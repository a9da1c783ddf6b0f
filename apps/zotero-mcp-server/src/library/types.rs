//! Library domain types
//!
//! Read-only views of Zotero items, collections and attachments as handed to
//! the server by a [`LibrarySource`](super::LibrarySource).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric item identifier (Zotero `itemID`)
pub type ItemId = i64;

/// Numeric collection identifier (Zotero `collectionID`)
pub type CollectionId = i64;

/// Numeric library identifier (Zotero `libraryID`)
pub type LibraryId = i64;

/// Relation predicate (e.g. `dc:relation`, `owl:sameAs`) to object URIs
pub type Relations = BTreeMap<String, Vec<String>>;

/// Content type that marks an attachment as a PDF
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A creator (author, editor, ...) of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub creator_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Single-field name (institutions, mononyms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Creator {
    /// Two-field creator ("Lastname, Firstname" style)
    pub fn person(creator_type: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            creator_type: creator_type.to_string(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            name: None,
        }
    }

    /// Single-field creator
    pub fn single(creator_type: &str, name: &str) -> Self {
        Self {
            creator_type: creator_type.to_string(),
            first_name: None,
            last_name: None,
            name: Some(name.to_string()),
        }
    }
}

/// A bibliographic record in the library
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    pub id: ItemId,
    pub key: String,
    #[serde(rename = "libraryID")]
    pub library_id: LibraryId,
    #[serde(default)]
    pub version: i64,
    pub item_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub creators: Vec<Creator>,
    /// Free-form date as entered by the user
    #[serde(default)]
    pub date: Option<String>,
    /// Remaining metadata fields (publicationTitle, DOI, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Key of the parent item for attachments and notes
    #[serde(default)]
    pub parent_item: Option<String>,
    /// Keys of the collections containing this item
    #[serde(default)]
    pub collections: Vec<String>,
    /// Child attachment ids in library order
    #[serde(default)]
    pub attachments: Vec<ItemId>,
    #[serde(default)]
    pub relations: Relations,
}

impl LibraryItem {
    /// Minimal item with the given identity, used by adapters and tests
    pub fn new(id: ItemId, key: &str, library_id: LibraryId, item_type: &str) -> Self {
        Self {
            id,
            key: key.to_string(),
            library_id,
            version: 0,
            item_type: item_type.to_string(),
            title: String::new(),
            creators: Vec::new(),
            date: None,
            fields: BTreeMap::new(),
            tags: Vec::new(),
            parent_item: None,
            collections: Vec::new(),
            attachments: Vec::new(),
            relations: Relations::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<ItemId>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// How an attachment's file is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Copied into `storage/<key>/`
    ImportedFile,
    /// Snapshot saved into `storage/<key>/`
    ImportedUrl,
    /// File elsewhere on disk, referenced by path
    LinkedFile,
    /// Web link, no file
    LinkedUrl,
    /// Image embedded in a note, stored like an imported file
    EmbeddedImage,
}

impl LinkMode {
    /// Map Zotero's numeric `linkMode` column
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::ImportedFile),
            1 => Some(Self::ImportedUrl),
            2 => Some(Self::LinkedFile),
            3 => Some(Self::LinkedUrl),
            4 => Some(Self::EmbeddedImage),
            _ => None,
        }
    }

    /// Whether the file lives in the profile's `storage/` directory
    pub fn is_stored(self) -> bool {
        matches!(
            self,
            Self::ImportedFile | Self::ImportedUrl | Self::EmbeddedImage
        )
    }
}

/// A file-bearing child item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: ItemId,
    pub key: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub link_mode: LinkMode,
    /// Path as stored by the library (`storage:file.pdf`, absolute path, ...)
    #[serde(default)]
    pub path: Option<String>,
}

impl Attachment {
    /// True only for an exact `application/pdf` content type
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref() == Some(PDF_CONTENT_TYPE)
    }
}

/// A named grouping of items, possibly nested
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub key: String,
    #[serde(rename = "libraryID")]
    pub library_id: LibraryId,
    #[serde(default)]
    pub version: i64,
    pub name: String,
    /// Parent collection key, passed through as the source reports it
    #[serde(default)]
    pub parent_key: Option<String>,
    #[serde(default)]
    pub child_item_ids: Vec<ItemId>,
    #[serde(default)]
    pub child_collection_ids: Vec<CollectionId>,
    #[serde(default)]
    pub relations: Relations,
}

impl Collection {
    pub fn new(id: CollectionId, key: &str, library_id: LibraryId, name: &str) -> Self {
        Self {
            id,
            key: key.to_string(),
            library_id,
            version: 0,
            name: name.to_string(),
            parent_key: None,
            child_item_ids: Vec::new(),
            child_collection_ids: Vec::new(),
            relations: Relations::new(),
        }
    }

    pub fn with_parent(mut self, parent_key: &str) -> Self {
        self.parent_key = Some(parent_key.to_string());
        self
    }

    pub fn with_children(mut self, items: Vec<ItemId>, collections: Vec<CollectionId>) -> Self {
        self.child_item_ids = items;
        self.child_collection_ids = collections;
        self
    }
}
