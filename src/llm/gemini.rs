use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{ChatBackend, EmbeddingBackend};
use super::types::ChatMessage;
use crate::core::errors::ApiError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const GEMINI_EMBEDDING_DIMENSION: usize = 768;

/// Google Generative Language REST client. Embeddings go through
/// `:embedContent` one text at a time; the API has no batch endpoint for the
/// embedding models we use.
#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    embedding_models: Vec<String>,
    chat_model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        embedding_models: Vec<String>,
        chat_model: String,
        request_timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            embedding_models,
            chat_model,
            client,
        })
    }

    async fn embed_with_model(
        &self,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url,
            model,
            urlencoding::encode(&self.api_key)
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let body = json!({
                "model": format!("models/{}", model),
                "content": { "parts": [{ "text": text }] },
            });

            let res = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(ApiError::internal)?;

            if !res.status().is_success() {
                let status = res.status();
                let detail = res.text().await.unwrap_or_default();
                return Err(ApiError::Internal(format!(
                    "Gemini embeddings error ({}): {}",
                    status, detail
                )));
            }

            let payload: EmbedContentResponse = res.json().await.map_err(ApiError::internal)?;
            if payload.embedding.values.is_empty() {
                return Err(ApiError::Internal(format!(
                    "Gemini model {} returned an empty embedding",
                    model
                )));
            }
            vectors.push(payload.embedding.values);
        }

        Ok(vectors)
    }
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dimension(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSION
    }

    /// Candidate models are tried in order; the first one that embeds every
    /// text wins. A partial result from one model is never mixed with another.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut last_error =
            ApiError::Internal("no Gemini embedding models configured".to_string());

        for model in &self.embedding_models {
            match self.embed_with_model(model, texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) => {
                    tracing::debug!("Gemini embedding model {} failed: {}", model, err);
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl ChatBackend for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ApiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.chat_model,
            urlencoding::encode(&self.api_key)
        );

        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        for message in messages {
            match message.role.as_str() {
                "system" => system_parts.push(json!({ "text": message.content })),
                "assistant" => {
                    contents.push(json!({ "role": "model", "parts": [{ "text": message.content }] }))
                }
                _ => contents.push(json!({ "role": "user", "parts": [{ "text": message.content }] })),
            }
        }

        let mut body = json!({ "contents": contents });
        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": system_parts });
        }

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Gemini chat error ({}): {}",
                status, detail
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        let content = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }
}
