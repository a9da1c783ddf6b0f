//! Route modules for the Zotero MCP server

pub mod collections;
pub mod health;
pub mod items;

use axum::{
    http::Method,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Longest key accepted on item and collection routes
pub const MAX_KEY_LEN: usize = 32;

/// Build the complete application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .nest("/items", items::router())
        .nest("/collections", collections::router())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Keys are non-empty ASCII alphanumerics of bounded length
pub(crate) fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(format!("Invalid key '{}'", key)));
    }
    Ok(())
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::Internal(format!("Handler panicked: {}", detail)).into_response()
}
