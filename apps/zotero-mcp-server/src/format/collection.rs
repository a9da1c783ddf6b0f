//! Collection records

use serde::Serialize;

use crate::library::{
    Collection, HasChildCollections, HasKeyAndVersion, ItemId, LibraryId, LibraryItem, Relations,
};

use super::item::{format_item, ItemDetails};

/// Detailed collection record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub key: String,
    pub version: i64,
    #[serde(rename = "libraryID")]
    pub library_id: LibraryId,
    pub name: String,
    pub parent_collection: Option<String>,
    pub relations: Relations,
}

/// Brief collection record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBrief {
    pub key: String,
    pub name: String,
    pub parent_collection: Option<String>,
}

/// Full child counts of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMeta {
    pub num_items: usize,
    pub num_collections: usize,
}

/// Detailed record plus counts and optional embedded children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDetails {
    #[serde(flatten)]
    pub collection: CollectionRecord,
    pub meta: CollectionMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemDetails>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcollections: Option<Vec<CollectionBrief>>,
}

/// Expansion options for [`format_collection_details`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionDetailsOptions {
    pub include_items: bool,
    pub include_subcollections: bool,
    /// Maximum embedded items; `None` or `0` embeds all of them
    pub items_limit: Option<usize>,
}

impl CollectionDetailsOptions {
    /// Number of items to embed out of `total`
    pub fn effective_limit(&self, total: usize) -> usize {
        match self.items_limit {
            None | Some(0) => total,
            Some(limit) => limit.min(total),
        }
    }

    /// Child item ids the caller has to resolve before formatting
    pub fn item_ids_to_fetch<'a>(&self, collection: &'a impl HasChildCollections) -> &'a [ItemId] {
        if !self.include_items {
            return &[];
        }
        let ids = collection.child_item_ids();
        &ids[..self.effective_limit(ids.len())]
    }
}

/// Children resolved by the caller, handed to the formatter
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionChildren<'a> {
    pub items: &'a [LibraryItem],
    pub subcollections: &'a [Collection],
}

/// Detailed record for a collection
pub fn format_collection(collection: Option<&Collection>) -> Option<CollectionRecord> {
    let collection = collection?;
    Some(CollectionRecord {
        key: collection.key().to_string(),
        version: collection.version(),
        library_id: collection.library_id(),
        name: collection.name.clone(),
        parent_collection: collection.parent_key.clone(),
        relations: collection.relations.clone(),
    })
}

/// Brief record for a collection
pub fn format_collection_brief(collection: Option<&Collection>) -> Option<CollectionBrief> {
    let collection = collection?;
    Some(CollectionBrief {
        key: collection.key.clone(),
        name: collection.name.clone(),
        parent_collection: collection.parent_key.clone(),
    })
}

/// Brief records for several collections, in input order
pub fn format_collection_list(collections: &[Collection]) -> Vec<CollectionBrief> {
    collections
        .iter()
        .filter_map(|c| format_collection_brief(Some(c)))
        .collect()
}

/// Collection with meta counts and the requested embedded children
///
/// Counts always come from the full child id lists. `children` may hold more
/// or fewer entries than requested; items are cut to the effective limit.
pub fn format_collection_details(
    collection: Option<&Collection>,
    options: &CollectionDetailsOptions,
    children: CollectionChildren<'_>,
) -> Option<CollectionDetails> {
    let record = format_collection(collection)?;
    let collection = collection?;

    let total_items = collection.child_item_ids().len();
    let meta = CollectionMeta {
        num_items: total_items,
        num_collections: collection.child_collection_ids().len(),
    };

    let items = options.include_items.then(|| {
        children
            .items
            .iter()
            .take(options.effective_limit(total_items))
            .filter_map(|item| format_item(Some(item)))
            .collect()
    });

    let subcollections = options
        .include_subcollections
        .then(|| format_collection_list(children.subcollections));

    Some(CollectionDetails {
        collection: record,
        meta,
        items,
        subcollections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::sample_library;
    use crate::library::LibrarySource;

    async fn details(key: &str, options: CollectionDetailsOptions) -> CollectionDetails {
        let library = sample_library();
        let collection = library.collection_by_key(key).await.unwrap().unwrap();
        let items = library
            .items_by_ids(options.item_ids_to_fetch(&collection))
            .await
            .unwrap();
        let subcollections = library
            .collections_by_ids(collection.child_collection_ids())
            .await
            .unwrap();
        format_collection_details(
            Some(&collection),
            &options,
            CollectionChildren {
                items: &items,
                subcollections: &subcollections,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_absent_collection_formats_to_none() {
        assert_eq!(format_collection(None), None);
        assert_eq!(format_collection_brief(None), None);
        assert!(format_collection_list(&[]).is_empty());
        assert_eq!(
            format_collection_details(
                None,
                &CollectionDetailsOptions::default(),
                CollectionChildren::default()
            ),
            None
        );
    }

    #[tokio::test]
    async fn test_parent_collection_reference() {
        let library = sample_library();

        let root = library.collection_by_key("COLL001").await.unwrap();
        assert_eq!(format_collection(root.as_ref()).unwrap().parent_collection, None);

        let child = library.collection_by_key("COLL002").await.unwrap();
        assert_eq!(
            format_collection(child.as_ref()).unwrap().parent_collection.as_deref(),
            Some("COLL001")
        );

        // Dangling parent is passed through untouched
        let orphan = library.collection_by_key("ORPHAN01").await.unwrap();
        assert_eq!(
            format_collection_brief(orphan.as_ref()).unwrap().parent_collection.as_deref(),
            Some("GONE0000")
        );
    }

    #[tokio::test]
    async fn test_record_json_field_names() {
        let library = sample_library();
        let root = library.collection_by_key("COLL001").await.unwrap();
        let json = serde_json::to_value(format_collection(root.as_ref())).unwrap();

        assert_eq!(json["key"], "COLL001");
        assert_eq!(json["libraryID"], 1);
        assert_eq!(json["name"], "Reading List");
        assert!(json["parentCollection"].is_null());
        assert!(json["relations"].is_object());
    }

    #[tokio::test]
    async fn test_items_limit_never_changes_counts() {
        for limit in [None, Some(0), Some(1), Some(2), Some(5), Some(50)] {
            let result = details(
                "COLL001",
                CollectionDetailsOptions {
                    include_items: true,
                    include_subcollections: false,
                    items_limit: limit,
                },
            )
            .await;
            assert_eq!(result.meta.num_items, 5, "limit {:?}", limit);
            assert_eq!(result.meta.num_collections, 2, "limit {:?}", limit);
        }
    }

    #[tokio::test]
    async fn test_items_limit_truncates_embedded_items() {
        let result = details(
            "COLL001",
            CollectionDetailsOptions {
                include_items: true,
                include_subcollections: false,
                items_limit: Some(2),
            },
        )
        .await;

        let items = result.items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "ITEM0001");
        assert_eq!(items[1].key, "ITEM0002");
        assert!(result.subcollections.is_none());
    }

    #[tokio::test]
    async fn test_zero_limit_embeds_everything() {
        let result = details(
            "COLL001",
            CollectionDetailsOptions {
                include_items: true,
                include_subcollections: true,
                items_limit: Some(0),
            },
        )
        .await;

        assert_eq!(result.items.unwrap().len(), 5);
        let subcollections = result.subcollections.unwrap();
        assert_eq!(subcollections.len(), 2);
        assert_eq!(subcollections[0].parent_collection.as_deref(), Some("COLL001"));
    }

    #[tokio::test]
    async fn test_children_omitted_unless_requested() {
        let result = details("COLL001", CollectionDetailsOptions::default()).await;
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["meta"]["numItems"], 5);
        assert_eq!(json["meta"]["numCollections"], 2);
        assert!(json.get("items").is_none());
        assert!(json.get("subcollections").is_none());
    }

    #[test]
    fn test_item_ids_to_fetch() {
        let collection = Collection::new(1, "COLL001", 1, "Reading List")
            .with_children(vec![1, 2, 3], Vec::new());

        let none = CollectionDetailsOptions::default();
        assert!(none.item_ids_to_fetch(&collection).is_empty());

        let capped = CollectionDetailsOptions {
            include_items: true,
            items_limit: Some(10),
            ..Default::default()
        };
        assert_eq!(capped.item_ids_to_fetch(&collection), &[1, 2, 3]);
    }
}
