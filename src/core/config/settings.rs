use serde_json::Value;

use crate::core::errors::ApiError;

/// What the embedding layer does once every backend in the chain has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// Fail the request. Callers never receive placeholder vectors.
    Strict,
    /// Return zero vectors and flag the response as degraded.
    Degraded,
}

impl FallbackMode {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("degraded") => FallbackMode::Degraded,
            Some("strict") | None => FallbackMode::Strict,
            Some(other) => {
                tracing::warn!(
                    "unknown embedding.fallback_mode '{}'; falling back to strict",
                    other
                );
                FallbackMode::Strict
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub fallback_mode: FallbackMode,
    pub request_timeout_secs: u64,
    pub openrouter_model: String,
    pub gemini_models: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub timeout_secs: u64,
    pub max_context_chars: usize,
    pub openrouter_model: String,
    pub gemini_model: String,
}

/// Typed view over the merged yaml configuration. Missing keys fall back to
/// defaults so a bare deployment works without any config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub rag: RagSettings,
    pub embedding: EmbeddingSettings,
    pub answer: AnswerSettings,
}

impl Settings {
    pub fn from_config(config: &Value) -> Self {
        let server = config.get("server");
        let rag = config.get("rag");
        let embedding = config.get("embedding");
        let answer = config.get("answer");

        let server = ServerSettings {
            host: server
                .and_then(|v| v.get("host"))
                .and_then(|v| v.as_str())
                .unwrap_or("127.0.0.1")
                .to_string(),
            port: server
                .and_then(|v| v.get("port"))
                .and_then(|v| v.as_u64())
                .map(|v| v.min(u16::MAX as u64) as u16)
                .unwrap_or(3001),
            cors_origins: string_list(server.and_then(|v| v.get("cors_allowed_origins"))),
            max_upload_bytes: server
                .and_then(|v| v.get("max_upload_bytes"))
                .and_then(|v| v.as_u64())
                .unwrap_or(25 * 1024 * 1024)
                .max(1) as usize,
        };

        let rag = RagSettings {
            chunk_size: rag
                .and_then(|v| v.get("chunk_size"))
                .and_then(|v| v.as_u64())
                .unwrap_or(800)
                .clamp(1, 100_000) as usize,
            chunk_overlap: rag
                .and_then(|v| v.get("chunk_overlap"))
                .and_then(|v| v.as_u64())
                .unwrap_or(120) as usize,
            top_k: rag
                .and_then(|v| v.get("top_k"))
                .and_then(|v| v.as_u64())
                .unwrap_or(5)
                .clamp(1, 50) as usize,
        };

        let embedding = EmbeddingSettings {
            fallback_mode: FallbackMode::parse(
                embedding
                    .and_then(|v| v.get("fallback_mode"))
                    .and_then(|v| v.as_str()),
            ),
            request_timeout_secs: embedding
                .and_then(|v| v.get("request_timeout_secs"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30)
                .clamp(1, 600),
            openrouter_model: embedding
                .and_then(|v| v.get("openrouter_model"))
                .and_then(|v| v.as_str())
                .unwrap_or("openai/text-embedding-3-small")
                .to_string(),
            gemini_models: {
                let models = string_list(embedding.and_then(|v| v.get("gemini_models")));
                if models.is_empty() {
                    vec![
                        "text-embedding-004".to_string(),
                        "embedding-001".to_string(),
                    ]
                } else {
                    models
                }
            },
        };

        let answer = AnswerSettings {
            timeout_secs: answer
                .and_then(|v| v.get("timeout_secs"))
                .and_then(|v| v.as_u64())
                .unwrap_or(45)
                .clamp(1, 600),
            max_context_chars: answer
                .and_then(|v| v.get("max_context_chars"))
                .and_then(|v| v.as_u64())
                .unwrap_or(4000)
                .clamp(200, 200_000) as usize,
            openrouter_model: answer
                .and_then(|v| v.get("openrouter_model"))
                .and_then(|v| v.as_str())
                .unwrap_or("openai/gpt-4o-mini")
                .to_string(),
            gemini_model: answer
                .and_then(|v| v.get("gemini_model"))
                .and_then(|v| v.as_str())
                .unwrap_or("gemini-1.5-flash")
                .to_string(),
        };

        Settings {
            server,
            rag,
            embedding,
            answer,
        }
    }

    /// Startup validation for the invariants the per-field clamps cannot
    /// express on their own.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ApiError::BadRequest(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        Ok(())
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_config_is_empty() {
        let settings = Settings::from_config(&Value::Null);

        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.rag.chunk_size, 800);
        assert_eq!(settings.rag.chunk_overlap, 120);
        assert_eq!(settings.rag.top_k, 5);
        assert_eq!(settings.embedding.fallback_mode, FallbackMode::Strict);
        assert_eq!(
            settings.embedding.openrouter_model,
            "openai/text-embedding-3-small"
        );
        assert_eq!(
            settings.embedding.gemini_models,
            vec!["text-embedding-004", "embedding-001"]
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn configured_values_override_defaults() {
        let config = json!({
            "server": {
                "host": "0.0.0.0",
                "port": 8080,
                "cors_allowed_origins": ["http://example.com", "  "],
                "max_upload_bytes": 1024
            },
            "rag": { "chunk_size": 400, "chunk_overlap": 50, "top_k": 3 },
            "embedding": {
                "fallback_mode": "degraded",
                "gemini_models": ["embedding-001"]
            },
            "answer": { "timeout_secs": 10 }
        });

        let settings = Settings::from_config(&config);

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.cors_origins, vec!["http://example.com"]);
        assert_eq!(settings.server.max_upload_bytes, 1024);
        assert_eq!(settings.rag.chunk_size, 400);
        assert_eq!(settings.rag.top_k, 3);
        assert_eq!(settings.embedding.fallback_mode, FallbackMode::Degraded);
        assert_eq!(settings.embedding.gemini_models, vec!["embedding-001"]);
        assert_eq!(settings.answer.timeout_secs, 10);
    }

    #[test]
    fn unknown_fallback_mode_falls_back_to_strict() {
        let config = json!({ "embedding": { "fallback_mode": "optimistic" } });
        let settings = Settings::from_config(&config);
        assert_eq!(settings.embedding.fallback_mode, FallbackMode::Strict);
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let config = json!({ "rag": { "chunk_size": 100, "chunk_overlap": 100 } });
        let settings = Settings::from_config(&config);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn top_k_is_clamped_into_range() {
        let config = json!({ "rag": { "top_k": 500 } });
        let settings = Settings::from_config(&config);
        assert_eq!(settings.rag.top_k, 50);

        let config = json!({ "rag": { "top_k": 0 } });
        let settings = Settings::from_config(&config);
        assert_eq!(settings.rag.top_k, 1);
    }
}
