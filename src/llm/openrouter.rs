use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{ChatBackend, EmbeddingBackend};
use super::types::ChatMessage;
use crate::core::errors::ApiError;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
// Attribution headers OpenRouter uses for its rankings page.
const OPENROUTER_REFERER: &str = "http://localhost:3000";
const OPENROUTER_TITLE: &str = "Crop Disease Pest Management System";

pub const OPENROUTER_EMBEDDING_DIMENSION: usize = 1536;

/// OpenRouter speaks the OpenAI wire format for both embeddings and chat.
#[derive(Clone)]
pub struct OpenRouterProvider {
    base_url: String,
    embedding_model: String,
    chat_model: String,
    client: Client,
}

impl OpenRouterProvider {
    pub fn new(
        api_key: &str,
        embedding_model: String,
        chat_model: String,
        request_timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(ApiError::internal)?,
        );
        headers.insert("HTTP-Referer", HeaderValue::from_static(OPENROUTER_REFERER));
        headers.insert("X-Title", HeaderValue::from_static(OPENROUTER_TITLE));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: OPENROUTER_BASE_URL.to_string(),
            embedding_model,
            chat_model,
            client,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn dimension(&self) -> usize {
        OPENROUTER_EMBEDDING_DIMENSION
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
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
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "OpenRouter embeddings error ({}): {}",
                status, text
            )));
        }

        let payload: EmbeddingsResponse = res.json().await.map_err(ApiError::internal)?;
        if payload.data.is_empty() {
            return Err(ApiError::Internal(
                "OpenRouter returned an empty embeddings response".to_string(),
            ));
        }

        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl ChatBackend for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.chat_model,
            "messages": messages,
            "stream": false,
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
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "OpenRouter chat error ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }
}
