use std::sync::Arc;

use crate::core::config::FallbackMode;
use crate::core::errors::ApiError;

use super::provider::{ChatBackend, EmbeddingBackend};
use super::types::ChatMessage;

/// Embeddings plus a marker for whether they are real or degraded-mode
/// placeholders. The marker must be propagated to anything shown to callers.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub vectors: Vec<Vec<f32>>,
    pub degraded: bool,
}

/// Ordered fallback chain over embedding backends. Backends are tried
/// sequentially and the first structurally valid result wins.
#[derive(Clone)]
pub struct EmbeddingService {
    backends: Vec<Arc<dyn EmbeddingBackend>>,
    fallback_mode: FallbackMode,
    degraded_dimension: usize,
}

impl EmbeddingService {
    pub fn new(
        backends: Vec<Arc<dyn EmbeddingBackend>>,
        fallback_mode: FallbackMode,
        degraded_dimension: usize,
    ) -> Self {
        Self {
            backends,
            fallback_mode,
            degraded_dimension,
        }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    pub async fn embed(&self, texts: &[String]) -> Result<EmbeddingOutcome, ApiError> {
        if texts.is_empty() {
            return Ok(EmbeddingOutcome {
                vectors: Vec::new(),
                degraded: false,
            });
        }

        for backend in &self.backends {
            match backend.embed(texts).await {
                Ok(vectors) => {
                    if let Err(reason) = validate_embeddings(&vectors, texts.len()) {
                        tracing::warn!(
                            "{} returned invalid embeddings: {}",
                            backend.name(),
                            reason
                        );
                        continue;
                    }
                    tracing::debug!(
                        "embedded {} texts via {} ({} dimensions)",
                        texts.len(),
                        backend.name(),
                        vectors[0].len()
                    );
                    return Ok(EmbeddingOutcome {
                        vectors,
                        degraded: false,
                    });
                }
                Err(err) => {
                    tracing::warn!("{} embedding failed: {}", backend.name(), err);
                }
            }
        }

        match self.fallback_mode {
            FallbackMode::Strict => Err(ApiError::EmbeddingUnavailable),
            FallbackMode::Degraded => {
                tracing::warn!(
                    "all embedding backends failed; returning zero vectors ({} dimensions)",
                    self.degraded_dimension
                );
                Ok(EmbeddingOutcome {
                    vectors: vec![vec![0.0; self.degraded_dimension]; texts.len()],
                    degraded: true,
                })
            }
        }
    }
}

/// A result is only accepted when it has one non-empty vector per input and
/// every vector shares a dimension. Anything else counts as a backend failure.
fn validate_embeddings(vectors: &[Vec<f32>], expected: usize) -> Result<(), String> {
    if vectors.len() != expected {
        return Err(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        ));
    }

    let Some(first) = vectors.first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err("empty vector at index 0".to_string());
    }

    let dimension = first.len();
    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != dimension {
            return Err(format!(
                "inconsistent dimensions: index {} has {} values, expected {}",
                index,
                vector.len(),
                dimension
            ));
        }
    }

    Ok(())
}

/// Ordered fallback chain over chat backends. An empty completion counts as a
/// failed backend so callers never see a silently blank answer.
#[derive(Clone)]
pub struct ChatService {
    backends: Vec<Arc<dyn ChatBackend>>,
}

impl ChatService {
    pub fn new(backends: Vec<Arc<dyn ChatBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ApiError> {
        let mut last_error = "no chat backends configured".to_string();

        for backend in &self.backends {
            match backend.chat(messages).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::debug!("chat completion from {}", backend.name());
                    return Ok(text);
                }
                Ok(_) => {
                    tracing::warn!("{} returned an empty completion", backend.name());
                    last_error = format!("{} returned an empty completion", backend.name());
                }
                Err(err) => {
                    tracing::warn!("{} chat failed: {}", backend.name(), err);
                    last_error = err.to_string();
                }
            }
        }

        Err(ApiError::Generation(last_error))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct ScriptedEmbedder {
        name: &'static str,
        dimension: usize,
        result: Result<Vec<Vec<f32>>, String>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl EmbeddingBackend for ScriptedEmbedder {
        fn name(&self) -> &str {
            self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            self.calls.lock().unwrap().push(self.name);
            match &self.result {
                // A single scripted vector is repeated per input; anything
                // else is returned verbatim so shape mismatches can be staged.
                Ok(vectors) if vectors.len() == 1 => {
                    Ok(vec![vectors[0].clone(); texts.len()])
                }
                Ok(vectors) => Ok(vectors.clone()),
                Err(message) => Err(ApiError::Internal(message.clone())),
            }
        }
    }

    fn embedder(
        name: &'static str,
        result: Result<Vec<Vec<f32>>, String>,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn EmbeddingBackend> {
        Arc::new(ScriptedEmbedder {
            name,
            dimension: 3,
            result,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn primary_backend_is_tried_first_and_short_circuits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let service = EmbeddingService::new(
            vec![
                embedder("primary", Ok(vec![vec![1.0, 0.0, 0.0]]), &calls),
                embedder("secondary", Ok(vec![vec![0.0, 1.0, 0.0]]), &calls),
            ],
            FallbackMode::Strict,
            3,
        );

        let outcome = service.embed(&["hello".to_string()]).await.unwrap();

        assert!(!outcome.degraded);
        assert_eq!(outcome.vectors, vec![vec![1.0, 0.0, 0.0]]);
        assert_eq!(*calls.lock().unwrap(), vec!["primary"]);
    }

    #[tokio::test]
    async fn failed_primary_falls_back_to_secondary_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let service = EmbeddingService::new(
            vec![
                embedder("primary", Err("boom".to_string()), &calls),
                embedder("secondary", Ok(vec![vec![0.0, 1.0, 0.0]]), &calls),
            ],
            FallbackMode::Strict,
            3,
        );

        let outcome = service.embed(&["hello".to_string()]).await.unwrap();

        assert_eq!(outcome.vectors, vec![vec![0.0, 1.0, 0.0]]);
        assert_eq!(*calls.lock().unwrap(), vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn invalid_shape_counts_as_backend_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Returns two vectors for one input.
        let service = EmbeddingService::new(
            vec![
                embedder(
                    "primary",
                    Ok(vec![vec![1.0, 0.0, 0.0], vec![0.5, 0.5, 0.0]]),
                    &calls,
                ),
                embedder("secondary", Ok(vec![vec![0.0, 1.0, 0.0]]), &calls),
            ],
            FallbackMode::Strict,
            3,
        );

        let outcome = service.embed(&["hello".to_string()]).await.unwrap();

        assert_eq!(outcome.vectors, vec![vec![0.0, 1.0, 0.0]]);
        assert_eq!(*calls.lock().unwrap(), vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn strict_mode_errors_when_every_backend_fails() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let service = EmbeddingService::new(
            vec![
                embedder("primary", Err("down".to_string()), &calls),
                embedder("secondary", Err("down too".to_string()), &calls),
            ],
            FallbackMode::Strict,
            3,
        );

        let err = service.embed(&["hello".to_string()]).await.unwrap_err();

        assert!(matches!(err, ApiError::EmbeddingUnavailable));
        assert_eq!(*calls.lock().unwrap(), vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn degraded_mode_returns_flagged_zero_vectors() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let service = EmbeddingService::new(
            vec![embedder("primary", Err("down".to_string()), &calls)],
            FallbackMode::Degraded,
            768,
        );

        let outcome = service
            .embed(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert_eq!(outcome.vectors.len(), 2);
        assert_eq!(outcome.vectors[0].len(), 768);
        assert!(outcome.vectors.iter().flatten().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn empty_input_embeds_to_nothing_without_calling_backends() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let service = EmbeddingService::new(
            vec![embedder("primary", Err("down".to_string()), &calls)],
            FallbackMode::Strict,
            3,
        );

        let outcome = service.embed(&[]).await.unwrap();

        assert!(outcome.vectors.is_empty());
        assert!(!outcome.degraded);
        assert!(calls.lock().unwrap().is_empty());
    }

    struct ScriptedChat {
        name: &'static str,
        result: Result<String, String>,
    }

    #[async_trait]
    impl ChatBackend for ScriptedChat {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ApiError> {
            match &self.result {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(ApiError::Internal(message.clone())),
            }
        }
    }

    fn chat_backend(name: &'static str, result: Result<String, String>) -> Arc<dyn ChatBackend> {
        Arc::new(ScriptedChat { name, result })
    }

    fn question() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: "user".to_string(),
            content: "hello".to_string(),
        }]
    }

    #[tokio::test]
    async fn empty_completion_falls_through_to_next_backend() {
        let service = ChatService::new(vec![
            chat_backend("primary", Ok("   ".to_string())),
            chat_backend("secondary", Ok("a real answer".to_string())),
        ]);

        let answer = service.chat(&question()).await.unwrap();
        assert_eq!(answer, "a real answer");
    }

    #[tokio::test]
    async fn exhausted_chat_chain_reports_the_last_error() {
        let service = ChatService::new(vec![
            chat_backend("primary", Err("first down".to_string())),
            chat_backend("secondary", Err("quota exceeded".to_string())),
        ]);

        let err = service.chat(&question()).await.unwrap_err();
        match err {
            ApiError::Generation(detail) => assert!(detail.contains("quota")),
            other => panic!("expected Generation, got {:?}", other),
        }
    }
}
