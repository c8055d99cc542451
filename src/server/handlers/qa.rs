use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QaRequest {
    pub query: Option<String>,
    #[serde(rename = "topK", alias = "top_k")]
    pub top_k: Option<usize>,
}

/// POST /qa
///
/// Answers a question using the indexed documents and reports which chunks
/// the answer was grounded in.
pub async fn qa(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = payload.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Missing query".to_string()));
    }

    let result = state.answer.answer(query, payload.top_k).await?;

    Ok(Json(json!({
        "answer": result.answer,
        "sources": result.sources,
        "degraded": result.degraded,
    })))
}
