//! Item records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::library::{
    Creator, HasAttachments, HasKeyAndVersion, LibraryId, LibraryItem, Relations,
};

/// Requested record granularity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Brief,
    Detailed,
}

/// Brief item record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBrief {
    pub key: String,
    pub item_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_item: Option<String>,
}

/// Counts derived from the item's children
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMeta {
    pub num_attachments: usize,
}

/// Detailed item record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    pub key: String,
    pub version: i64,
    #[serde(rename = "libraryID")]
    pub library_id: LibraryId,
    pub item_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_item: Option<String>,
    pub creators: Vec<Creator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub collections: Vec<String>,
    pub relations: Relations,
    pub meta: ItemMeta,
}

/// Either granularity, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemRecord {
    Brief(ItemBrief),
    Detailed(ItemDetails),
}

/// Detailed record for an item
pub fn format_item(item: Option<&LibraryItem>) -> Option<ItemDetails> {
    let item = item?;
    Some(ItemDetails {
        key: item.key().to_string(),
        version: item.version(),
        library_id: item.library_id(),
        item_type: item.item_type.clone(),
        title: item.title.clone(),
        parent_item: item.parent_item.clone(),
        creators: item.creators.clone(),
        date: item.date.clone(),
        fields: item.fields.clone(),
        tags: item.tags.clone(),
        collections: item.collections.clone(),
        relations: item.relations.clone(),
        meta: ItemMeta {
            num_attachments: item.attachment_ids().len(),
        },
    })
}

/// Brief record for an item
pub fn format_item_brief(item: Option<&LibraryItem>) -> Option<ItemBrief> {
    let item = item?;
    Some(ItemBrief {
        key: item.key.clone(),
        item_type: item.item_type.clone(),
        title: item.title.clone(),
        parent_item: item.parent_item.clone(),
    })
}

/// Record for an item in the requested granularity
pub fn format_item_as(item: Option<&LibraryItem>, format: RecordFormat) -> Option<ItemRecord> {
    match format {
        RecordFormat::Brief => format_item_brief(item).map(ItemRecord::Brief),
        RecordFormat::Detailed => format_item(item).map(ItemRecord::Detailed),
    }
}

/// Records for several items, in input order
pub fn format_items(items: &[LibraryItem], format: RecordFormat) -> Vec<ItemRecord> {
    items
        .iter()
        .filter_map(|item| format_item_as(Some(item), format))
        .collect()
}
