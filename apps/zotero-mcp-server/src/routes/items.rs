//! Item endpoints
//!
//! - `GET /items`: brief or detailed listing, paged with `limit`/`start`
//! - `GET /items/:key`: one item
//! - `GET /items/:key/fulltext`: extracted text of the item's PDF attachment

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::format::{format_item_as, format_items, ItemRecord, RecordFormat};
use crate::state::AppState;

use super::validate_key;

/// Header carrying the number of listable items
pub const TOTAL_RESULTS_HEADER: &str = "total-results";

const MAX_LIMIT: usize = 100;

/// Query parameters for the item listing
#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    /// Page size (1..=100, default: 25)
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset into the listing
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub format: RecordFormat,
}

fn default_limit() -> usize {
    25
}

/// Query parameters for a single item
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub format: Option<RecordFormat>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items))
        .route("/:key", get(get_item))
        .route("/:key/fulltext", get(get_fulltext))
}

async fn list_items(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListItemsQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(params) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    if !(1..=MAX_LIMIT).contains(&params.limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, params.limit
        )));
    }

    let page = state.library().list_items(params.start, params.limit).await?;
    tracing::debug!(
        "Listing {} of {} items from offset {}",
        page.items.len(),
        page.total,
        params.start
    );

    Ok((
        [(
            HeaderName::from_static(TOTAL_RESULTS_HEADER),
            HeaderValue::from(page.total),
        )],
        Json(format_items(&page.items, params.format)),
    )
        .into_response())
}

async fn get_item(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: std::result::Result<Query<ItemQuery>, QueryRejection>,
) -> Result<Json<ItemRecord>> {
    let Query(params) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    validate_key(&key)?;

    let item = state.library().item_by_key(&key).await?;
    let format = params.format.unwrap_or(RecordFormat::Detailed);
    format_item_as(item.as_ref(), format)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Item '{}' not found", key)))
}

/// Full text as `text/plain`; errors are plain text too, tagged with their kind
async fn get_fulltext(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    if let Err(e) = validate_key(&key) {
        return e.into_text_response();
    }

    match state.documents().get_full_text(&key).await {
        Ok(text) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::debug!("Full text for {} unavailable: {}", key, e);
            AppError::from(e).into_text_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ERROR_KIND_HEADER;
    use crate::pdf::testing::FakeExtractor;
    use crate::routes::testing::{app, get, get_json};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use std::sync::Arc;

    async fn text_body(response: Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_list_items_brief_by_default() {
        let (app, _) = app(FakeExtractor::pages(&[]));
        let response = get(&app, "/items?limit=3").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[TOTAL_RESULTS_HEADER], "8");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["key"], "ABCD1234");
        assert!(items[0].get("version").is_none());
    }

    #[tokio::test]
    async fn test_list_items_window_and_detailed_format() {
        let (app, _) = app(FakeExtractor::pages(&[]));
        let (status, json) = get_json(&app, "/items?start=3&limit=2&format=detailed").await;
        assert_eq!(status, StatusCode::OK);

        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["key"], "ITEM0001");
        assert_eq!(items[0]["libraryID"], 1);
        assert_eq!(items[0]["meta"]["numAttachments"], 0);
    }

    #[tokio::test]
    async fn test_list_items_rejects_bad_query() {
        let (app, _) = app(FakeExtractor::pages(&[]));

        let (status, json) = get_json(&app, "/items?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");

        let (status, _) = get_json(&app, "/items?limit=101").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(&app, "/items?format=verbose").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(&app, "/items?start=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_item_detailed_by_default() {
        let (app, _) = app(FakeExtractor::pages(&[]));
        let (status, json) = get_json(&app, "/items/ABCD1234").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["key"], "ABCD1234");
        assert_eq!(json["version"], 42);
        assert_eq!(json["meta"]["numAttachments"], 2);

        let (_, brief) = get_json(&app, "/items/ABCD1234?format=brief").await;
        assert_eq!(brief["title"], "Deep Reading");
        assert!(brief.get("meta").is_none());
    }

    #[tokio::test]
    async fn test_unknown_item_is_404() {
        let (app, _) = app(FakeExtractor::pages(&[]));
        let (status, json) = get_json(&app, "/items/NOPE0000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], "Item 'NOPE0000' not found");
    }

    #[tokio::test]
    async fn test_invalid_key_is_400() {
        let (app, _) = app(FakeExtractor::pages(&[]));
        let (status, json) = get_json(&app, "/items/not-a-key").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_fulltext_of_two_page_pdf() {
        let (app, documents) = app(FakeExtractor::pages(&["Page one content", "Page two content"]));
        let response = get(&app, "/items/ABCD1234/fulltext").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let text = text_body(response).await;
        assert_eq!(text, "Page one content\n\n--- Page 2 ---\n\nPage two content");
        assert_eq!(documents.stats().workers_terminated, 1);
    }

    #[tokio::test]
    async fn test_fulltext_error_statuses() {
        let (app, _) = app(FakeExtractor::pages(&["x"]));
        let cases = [
            ("/items/NOPE0000/fulltext", StatusCode::NOT_FOUND, "not_found"),
            ("/items/NOPDF001/fulltext", StatusCode::UNPROCESSABLE_ENTITY, "no_attachment"),
            ("/items/NOFILE01/fulltext", StatusCode::GONE, "no_file_path"),
            ("/items/bad%20key/fulltext", StatusCode::BAD_REQUEST, "validation_error"),
        ];
        for (uri, status, kind) in cases {
            let response = get(&app, uri).await;
            assert_eq!(response.status(), status, "{}", uri);
            assert_eq!(response.headers()[ERROR_KIND_HEADER], kind, "{}", uri);
        }

        let text = text_body(get(&app, "/items/NOPE0000/fulltext").await).await;
        assert_eq!(text, "Item 'NOPE0000' not found");
    }

    #[tokio::test]
    async fn test_fulltext_extraction_failure_is_500() {
        let (app, documents) = app(Arc::new(FakeExtractor::Fail));
        let response = get(&app, "/items/ABCD1234/fulltext").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[ERROR_KIND_HEADER], "extraction_error");
        assert!(text_body(response).await.starts_with("Failed to extract text"));

        let stats = documents.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.workers_terminated, 1);
    }
}
