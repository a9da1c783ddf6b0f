//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::library::LibraryId;
use crate::pdf::ExtractionStatsSnapshot;
use crate::state::AppState;

/// Body of `GET /ping`, checked by the self-test
pub const PING_BODY: &str = "zotero-mcp-server is running";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    #[serde(rename = "libraryID")]
    pub library_id: LibraryId,
    pub extraction: ExtractionStatsSnapshot,
}

pub async fn ping() -> &'static str {
    PING_BODY
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "zotero-mcp-server",
        library_id: state.library().library_id(),
        extraction: state.documents().stats(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
}
