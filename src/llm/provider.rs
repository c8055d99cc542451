use async_trait::async_trait;

use super::types::ChatMessage;
use crate::core::errors::ApiError;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// return the backend name (e.g. "openrouter", "gemini")
    fn name(&self) -> &str;

    /// nominal dimensionality of the vectors this backend produces
    fn dimension(&self) -> usize;

    /// embed a batch of texts, one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// return the backend name (e.g. "openrouter", "gemini")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ApiError>;
}
