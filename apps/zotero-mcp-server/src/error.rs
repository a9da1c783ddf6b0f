//! Error types for the Zotero MCP server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::library::LibraryError;
use crate::pdf::{DocumentAccessError, ExtractionError};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Header naming the error kind on plain-text error responses
pub const ERROR_KIND_HEADER: &str = "x-error-kind";

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NoAttachment(String),

    #[error("{0}")]
    NoFilePath(String),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DocumentAccessError> for AppError {
    fn from(e: DocumentAccessError) -> Self {
        match e {
            DocumentAccessError::NotFound(_) => AppError::NotFound(e.to_string()),
            DocumentAccessError::NoAttachment(_) => AppError::NoAttachment(e.to_string()),
            DocumentAccessError::NoFilePath(_) => AppError::NoFilePath(e.to_string()),
            DocumentAccessError::Extraction(e) => AppError::Extraction(e),
            DocumentAccessError::Library(e) => AppError::Library(e),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::NoAttachment(_) => "no_attachment",
            AppError::NoFilePath(_) => "no_file_path",
            AppError::Extraction(_) => "extraction_error",
            AppError::Validation(_) => "validation_error",
            AppError::Library(_) => "library_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoAttachment(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoFilePath(_) => StatusCode::GONE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Extraction(_) | AppError::Library(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show a client; server-side failures stay generic
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::NoAttachment(msg)
            | AppError::NoFilePath(msg)
            | AppError::Validation(msg) => msg.clone(),
            AppError::Extraction(e) => {
                tracing::error!("Extraction error: {}", e);
                format!("Failed to extract text: {}", e)
            }
            AppError::Library(e) => {
                tracing::error!("Library error: {}", e);
                "Library unavailable".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
        }
    }

    /// Plain-text rendition used by the fulltext route
    pub fn into_text_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.public_message();
        (
            status,
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                ),
                (
                    header::HeaderName::from_static(ERROR_KIND_HEADER),
                    HeaderValue::from_static(kind),
                ),
            ],
            message,
        )
            .into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.public_message(),
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::NoAttachment("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::NoFilePath("x".into()).status(), StatusCode::GONE);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Extraction(ExtractionError::Cancelled).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Library(LibraryError::Unavailable("db".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_document_access_error() {
        let err: AppError = DocumentAccessError::NotFound("NOPE0000".into()).into();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "Item 'NOPE0000' not found");

        let err: AppError = DocumentAccessError::NoFilePath("NOFILE01".into()).into();
        assert_eq!(err.kind(), "no_file_path");

        let timeout = ExtractionError::Timeout(Duration::from_secs(60));
        let err: AppError = DocumentAccessError::Extraction(timeout).into();
        assert!(matches!(err, AppError::Extraction(ExtractionError::Timeout(_))));
        assert_eq!(err.to_string(), "Extraction failed: Extraction timed out after 60s");
    }

    #[tokio::test]
    async fn test_json_body() {
        let response = AppError::NotFound("Item 'NOPE0000' not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], "Item 'NOPE0000' not found");
    }

    #[tokio::test]
    async fn test_internal_message_is_generic() {
        let response = AppError::Library(LibraryError::Unavailable("secret path".into())).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Library unavailable");
    }

    #[tokio::test]
    async fn test_text_response_carries_kind() {
        let response = AppError::NoAttachment("No PDF attachment found for item 'NOPDF001'".into())
            .into_text_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.headers()[ERROR_KIND_HEADER], "no_attachment");
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"No PDF attachment found for item 'NOPDF001'");
    }
}
