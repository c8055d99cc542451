use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::StagedFile;
use crate::state::AppState;

/// POST /ingest
///
/// Accepts a multipart form with one or more parts named `files`, indexes
/// every uploaded document and reports how many chunks were inserted.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let files = collect_staged_files(multipart).await?;
    let report = state.ingest.ingest(files).await?;

    Ok(Json(json!({
        "ok": true,
        "inserted": report.inserted,
        "message": format!("Successfully ingested {} document chunks", report.inserted),
        "degraded": report.degraded,
    })))
}

/// Pulls every part named `files` out of the form; other parts are ignored.
async fn collect_staged_files(mut multipart: Multipart) -> Result<Vec<StagedFile>, ApiError> {
    let mut files: Vec<StagedFile> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid multipart request: {}", err)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field.bytes().await.map_err(|err| {
            ApiError::BadRequest(format!("failed to read upload '{}': {}", name, err))
        })?;
        files.push(StagedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}
