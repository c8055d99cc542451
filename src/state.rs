use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::gemini::{GeminiProvider, GEMINI_EMBEDDING_DIMENSION};
use crate::llm::openrouter::OpenRouterProvider;
use crate::llm::{ChatBackend, ChatService, EmbeddingBackend, EmbeddingService};
use crate::rag::{AnswerService, ChunkConfig, IngestService, MemoryVectorStore};

#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub store: Arc<MemoryVectorStore>,
    pub ingest: IngestService,
    pub answer: AnswerService,
    #[allow(dead_code)]
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn initialize(paths: Arc<AppPaths>) -> anyhow::Result<Arc<Self>> {
        let config = ConfigService::new(paths.clone());
        let merged = config.load_config()?;
        let settings = Settings::from_config(&merged);
        settings.validate()?;

        let mut embedding_backends: Vec<Arc<dyn EmbeddingBackend>> = Vec::new();
        let mut chat_backends: Vec<Arc<dyn ChatBackend>> = Vec::new();

        match resolve_api_key("OPENROUTER_API_KEY", &merged, "embedding", "openrouter_api_key") {
            Some(key) => {
                let provider = Arc::new(OpenRouterProvider::new(
                    &key,
                    settings.embedding.openrouter_model.clone(),
                    settings.answer.openrouter_model.clone(),
                    settings.embedding.request_timeout_secs,
                )?);
                embedding_backends.push(provider.clone());
                chat_backends.push(provider);
            }
            None => {
                tracing::info!("OpenRouter API key missing or invalid; skipping backend");
            }
        }

        match resolve_api_key("GEMINI_API_KEY", &merged, "embedding", "gemini_api_key") {
            Some(key) => {
                let provider = Arc::new(GeminiProvider::new(
                    &key,
                    settings.embedding.gemini_models.clone(),
                    settings.answer.gemini_model.clone(),
                    settings.embedding.request_timeout_secs,
                )?);
                embedding_backends.push(provider.clone());
                chat_backends.push(provider);
            }
            None => {
                tracing::info!("Gemini API key missing or invalid; skipping backend");
            }
        }

        // Degraded-mode vectors take the dimension of the last backend in
        // the chain, so an index built before the outage stays queryable.
        let degraded_dimension = embedding_backends
            .last()
            .map(|backend| backend.dimension())
            .unwrap_or(GEMINI_EMBEDDING_DIMENSION);

        let embeddings = EmbeddingService::new(
            embedding_backends,
            settings.embedding.fallback_mode,
            degraded_dimension,
        );
        let chat = ChatService::new(chat_backends);
        tracing::info!(
            "embedding backends: {:?}; chat backends: {:?}",
            embeddings.backend_names(),
            chat.backend_names()
        );

        let store = Arc::new(MemoryVectorStore::new());
        let ingest = IngestService::new(
            store.clone(),
            embeddings.clone(),
            ChunkConfig {
                chunk_size: settings.rag.chunk_size,
                chunk_overlap: settings.rag.chunk_overlap,
            },
        );
        let answer = AnswerService::new(
            store.clone(),
            embeddings,
            chat,
            settings.answer.clone(),
            settings.rag.top_k,
        );
        let started_at = Utc::now();

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            store,
            ingest,
            answer,
            started_at,
        }))
    }
}

/// Looks an API key up in the environment first, then in the merged config.
/// Keys that fail [`is_valid_api_key`] are treated as absent.
fn resolve_api_key(env_var: &str, config: &Value, section: &str, key: &str) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_string();
        if is_valid_api_key(&value) {
            return Some(value);
        }
    }

    config
        .get(section)
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| is_valid_api_key(v))
}

/// Sample configs ship placeholder keys starting with "YOUR_"; real keys are
/// long opaque strings.
fn is_valid_api_key(key: &str) -> bool {
    key.len() >= 10 && !key.starts_with("YOUR_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_or_placeholder_keys_are_rejected() {
        assert!(!is_valid_api_key("short"));
        assert!(!is_valid_api_key("YOUR_GEMINI_API_KEY_HERE"));
        assert!(!is_valid_api_key("YOUR_OPENROUTER_API_KEY_HERE"));
        assert!(is_valid_api_key("sk-or-v1-0123456789abcdef"));
    }

    #[test]
    fn config_keys_are_trimmed_and_validated() {
        let config = json!({
            "embedding": {
                "openrouter_api_key": "  sk-or-v1-0123456789abcdef  ",
                "gemini_api_key": "YOUR_GEMINI_API_KEY_HERE"
            }
        });

        let openrouter = resolve_api_key(
            "CROPSAGE_TEST_UNSET_OPENROUTER",
            &config,
            "embedding",
            "openrouter_api_key",
        );
        assert_eq!(openrouter.as_deref(), Some("sk-or-v1-0123456789abcdef"));

        let gemini = resolve_api_key(
            "CROPSAGE_TEST_UNSET_GEMINI",
            &config,
            "embedding",
            "gemini_api_key",
        );
        assert!(gemini.is_none());
    }
}
