//! Response formatters
//!
//! Pure mappings from library objects to the JSON records served over HTTP.
//! Nothing here performs I/O or fails: absent input maps to `None`.

mod collection;
mod item;

pub use collection::{
    format_collection, format_collection_brief, format_collection_details,
    format_collection_list, CollectionBrief, CollectionChildren, CollectionDetails,
    CollectionDetailsOptions, CollectionMeta, CollectionRecord,
};
pub use item::{
    format_item, format_item_as, format_item_brief, format_items, ItemBrief, ItemMeta,
    ItemRecord, ItemDetails, RecordFormat,
};
