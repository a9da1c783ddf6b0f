//! Library data sources
//!
//! The server never owns library data. Everything it reports is read on
//! demand through a [`LibrarySource`], which has two adapters:
//!
//! - [`ZoteroDatabase`]: read-only access to a Zotero profile (`zotero.sqlite`
//!   plus the `storage/` directory)
//! - [`MemoryLibrary`]: an in-memory store, optionally loaded from a JSON
//!   snapshot, used for fixtures and offline runs

mod error;
mod memory;
mod traits;
mod types;
mod zotero;

pub use error::{LibraryError, Result};
pub use memory::{LibrarySnapshot, MemoryLibrary};
pub use traits::{HasAttachments, HasChildCollections, HasKeyAndVersion, ItemPage, LibrarySource};
pub use types::{
    Attachment, Collection, CollectionId, Creator, ItemId, LibraryId, LibraryItem, LinkMode,
    Relations, PDF_CONTENT_TYPE,
};
pub use zotero::ZoteroDatabase;

#[cfg(test)]
pub(crate) use memory::fixtures;
