//! Unified server error type.
//!
//! Handlers return `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{"error": …, "code": …}` with an appropriate status code.
//!
//! Conversion, persistence and internal errors are logged with full detail;
//! the client only receives a generic message so file system paths and
//! codec internals never leak.

use crate::error::MorphError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the conversion library.
    #[error(transparent)]
    Morph(#[from] MorphError),

    /// The multipart request is malformed or misses a field.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upload exceeds the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Morph(MorphError::Cancelled { .. }) => StatusCode::REQUEST_TIMEOUT,
            ServerError::Morph(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ServerError::Morph(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Machine-readable code for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Morph(e) => e.code(),
            ServerError::BadRequest(_) => "INVALID_FILE",
            ServerError::PayloadTooLarge(_) => "FILE_TOO_LARGE",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
            match &self {
                ServerError::Morph(MorphError::ConversionFailed { from, to, .. }) => {
                    format!("conversion {from} → {to} failed")
                }
                ServerError::Morph(MorphError::OutputPersistenceFailed { .. }) => {
                    "could not store the converted file".to_owned()
                }
                _ => "internal server error".to_owned(),
            }
        } else {
            self.to_string()
        };
        (
            status,
            Json(json!({ "error": client_message, "code": self.code() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileType;

    #[test]
    fn client_errors_map_to_400() {
        let e: ServerError = MorphError::UnsupportedMimeType { mime: "x/y".into() }.into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        let e: ServerError = MorphError::UnsupportedSubType {
            file_type: FileType::Image,
            sub_type: "x-icon".into(),
        }
        .into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_errors_map_to_500() {
        let e: ServerError = MorphError::conversion("png", "pdf", "engine exploded").into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let e: ServerError = MorphError::OutputPersistenceFailed {
            path: "/srv/out/a.png".into(),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code(), "CANT_WRITE_FILE");
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let e: ServerError = MorphError::conversion("png", "pdf", "/secret/lib/path").into();
        let response = e.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("/secret"), "got: {text}");
        assert!(text.contains("CONVERSION_FAILED"));
    }
}
