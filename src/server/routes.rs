//! Route handlers.
//!
//! | Method | Path             | Body                                      |
//! |--------|------------------|-------------------------------------------|
//! | POST   | `/upload`        | multipart `uploadFile` + `input_format`   |
//! | POST   | `/format`        | multipart `uploadFile`                    |
//! | GET    | `/files/{name}`  | -                                         |
//! | GET    | `/health`        | -                                         |

use super::error::ServerError;
use super::state::AppState;
use crate::catalog::FileType;
use crate::convert::inspect_bytes;
use crate::pipeline::{CancelFlag, ConversionRequest};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Multipart field carrying the file.
pub const UPLOAD_FIELD: &str = "uploadFile";
/// Multipart field carrying the requested target subtype.
pub const TARGET_FIELD: &str = "input_format";

/// RFC 3986 unreserved characters stay literal in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Build the application router.
pub fn build(state: AppState) -> Router {
    let limit = state.config.max_upload_bytes();
    let files = ServeDir::new(state.store.dir());

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/format", post(formats))
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub file_type: FileType,
    pub url: String,
}

/// `POST /upload`: convert the uploaded file and store the result.
async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let form = read_form(multipart).await?;
    let target = form
        .target
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::BadRequest(format!("missing '{TARGET_FIELD}' field")))?;
    let (file_name, bytes) = form.file()?;

    let permit = state
        .conversions
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    // Dropped with the handler future when the client goes away. The permit
    // instead stays with the blocking task until the codec returns.
    let cancel = CancelOnDrop::default();
    let request = ConversionRequest::sniffed(bytes, file_name, target);
    let output = state
        .pipeline
        .run_blocking_holding(request, Some(cancel.flag()), permit)
        .await?;

    let store = state.store.clone();
    let (output, path) =
        tokio::task::spawn_blocking(move || store.save(&output).map(|path| (output, path)))
            .await
            .map_err(|e| ServerError::Internal(format!("write task panicked: {e}")))??;

    info!(
        file = %output.file_name,
        from = %output.source_sub_type,
        to = %output.target_sub_type,
        bytes = output.len(),
        duration_ms = output.duration_ms,
        path = %path.display(),
        "converted upload"
    );

    Ok(Json(UploadResponse {
        url: file_url(&output.file_name),
        filename: output.file_name,
        file_type: output.file_type,
    }))
}

/// Link under `/files` for a stored file name.
fn file_url(file_name: &str) -> String {
    format!("/files/{}", utf8_percent_encode(file_name, PATH_SEGMENT))
}

/// `POST /format`: list the targets the uploaded file can be converted to.
async fn formats(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BTreeMap<&'static str, &'static str>>, ServerError> {
    let (file_name, bytes) = read_form(multipart).await?.file()?;
    let inspection = inspect_bytes(&bytes, &file_name, state.pipeline.runtime())?;
    debug!(file = %file_name, mime = %inspection.mime, "listed formats");
    Ok(Json(inspection.supported_formats))
}

/// `GET /health`
async fn health() -> Json<Value> {
    Json(json!({
        "status":  "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── multipart ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    target: Option<String>,
}

impl UploadForm {
    fn file(self) -> Result<(String, Vec<u8>), ServerError> {
        match self.file {
            Some((_, bytes)) if bytes.is_empty() => {
                Err(ServerError::BadRequest("uploaded file is empty".into()))
            }
            Some(file) => Ok(file),
            None => Err(ServerError::BadRequest(format!(
                "missing '{UPLOAD_FIELD}' field"
            ))),
        }
    }
}

/// Collect the known fields; unknown fields are skipped.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ServerError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(UPLOAD_FIELD) => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                debug!(file = %file_name, bytes = bytes.len(), "received upload");
                form.file = Some((file_name, bytes.to_vec()));
            }
            Some(TARGET_FIELD) => {
                form.target = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }
    Ok(form)
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::BadRequest(e.body_text())
    }
}

/// Sets its flag when dropped.
#[derive(Debug, Default)]
struct CancelOnDrop(CancelFlag);

impl CancelOnDrop {
    fn flag(&self) -> CancelFlag {
        self.0.clone()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
