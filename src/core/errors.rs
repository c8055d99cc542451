use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("failed to extract text from {filename}: {reason}")]
    Extraction { filename: String, reason: String },
    #[error("unable to generate embeddings: all configured providers are unavailable")]
    EmbeddingUnavailable,
    #[error("vector store error: {0}")]
    VectorStore(String),
    #[error("failed to generate answer: {0}")]
    Generation(String),
    #[error("answer generation timed out")]
    GenerationTimeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    /// stable machine-readable code for the response envelope
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Extraction { .. } => "extraction_failed",
            ApiError::EmbeddingUnavailable => "embedding_unavailable",
            ApiError::VectorStore(_) => "vector_store",
            ApiError::Generation(_) => "generation_failed",
            ApiError::GenerationTimeout => "generation_timeout",
            ApiError::Internal(_) => "internal",
        }
    }

    /// human-readable message; provider failures are translated into
    /// something a non-technical user can act on
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Generation(detail) => friendly_generation_message(detail),
            ApiError::GenerationTimeout => {
                "The answer is taking too long to generate. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn friendly_generation_message(detail: &str) -> String {
    if detail.contains("quota") {
        "The AI service is temporarily unavailable due to usage limits. Please try again later or ask a different question.".to_string()
    } else if detail.contains("API key") {
        "The AI service is not properly configured. Please contact the administrator.".to_string()
    } else if !detail.is_empty() {
        format!("I encountered an issue: {}", detail)
    } else {
        "Sorry, I'm having trouble answering your question right now.".to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.code(),
            "message": self.user_message(),
        }));
        (status, body).into_response()
    }
}
