//! Collection endpoints

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::format::{
    format_collection_details, format_collection_list, CollectionBrief, CollectionChildren,
    CollectionDetails, CollectionDetailsOptions,
};
use crate::library::HasChildCollections;
use crate::state::AppState;

use super::validate_key;

/// Query parameters for a single collection
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionQuery {
    #[serde(default)]
    pub include_items: bool,
    #[serde(default)]
    pub include_subcollections: bool,
    /// Embedded item cap; `0` embeds all
    pub items_limit: Option<usize>,
}

impl From<CollectionQuery> for CollectionDetailsOptions {
    fn from(query: CollectionQuery) -> Self {
        CollectionDetailsOptions {
            include_items: query.include_items,
            include_subcollections: query.include_subcollections,
            items_limit: query.items_limit,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_collections))
        .route("/:key", get(get_collection))
}

async fn list_collections(State(state): State<AppState>) -> Result<Json<Vec<CollectionBrief>>> {
    let collections = state.library().list_collections().await?;
    Ok(Json(format_collection_list(&collections)))
}

async fn get_collection(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: std::result::Result<Query<CollectionQuery>, QueryRejection>,
) -> Result<Json<CollectionDetails>> {
    let Query(params) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    validate_key(&key)?;

    let library = state.library();
    let collection = library
        .collection_by_key(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", key)))?;
    let options = CollectionDetailsOptions::from(params);

    let items = library
        .items_by_ids(options.item_ids_to_fetch(&collection))
        .await?;
    let subcollections = if options.include_subcollections {
        library
            .collections_by_ids(collection.child_collection_ids())
            .await?
    } else {
        Vec::new()
    };
    tracing::debug!(
        "Collection {}: embedding {} items, {} subcollections",
        key,
        items.len(),
        subcollections.len()
    );

    format_collection_details(
        Some(&collection),
        &options,
        CollectionChildren {
            items: &items,
            subcollections: &subcollections,
        },
    )
    .map(Json)
    .ok_or_else(|| AppError::Internal(format!("Collection '{}' could not be formatted", key)))
}
