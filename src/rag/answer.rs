//! Question answering over the indexed chunks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::config::AnswerSettings;
use crate::core::errors::ApiError;
use crate::llm::{ChatService, EmbeddingService};

use super::context_builder::{build_context, build_messages};
use super::store::{MemoryVectorStore, RetrievalResult};

/// One chunk the answer was grounded in, reported back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    /// True when the query was embedded with degraded-mode vectors, which
    /// makes the retrieved sources unreliable.
    pub degraded: bool,
}

/// Runs embed -> retrieve -> generate for a user question.
#[derive(Clone)]
pub struct AnswerService {
    store: Arc<MemoryVectorStore>,
    embeddings: EmbeddingService,
    chat: ChatService,
    settings: AnswerSettings,
    default_top_k: usize,
}

impl AnswerService {
    pub fn new(
        store: Arc<MemoryVectorStore>,
        embeddings: EmbeddingService,
        chat: ChatService,
        settings: AnswerSettings,
        default_top_k: usize,
    ) -> Self {
        Self {
            store,
            embeddings,
            chat,
            settings,
            default_top_k,
        }
    }

    pub async fn answer(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<AnswerResult, ApiError> {
        let top_k = top_k.unwrap_or(self.default_top_k).clamp(1, 50);

        let outcome = self.embeddings.embed(&[query.to_string()]).await?;
        let vector = outcome.vectors.into_iter().next().ok_or_else(|| {
            ApiError::Internal("embedding produced no vector for the query".to_string())
        })?;

        let results = self.store.query(&vector, top_k).await;
        let sources: Vec<SourceRef> = results
            .iter()
            .map(|result| SourceRef {
                id: result.id.clone(),
                score: result.score,
            })
            .collect();

        let context = build_context(&results, self.settings.max_context_chars);
        let messages = build_messages(query, &context);

        let deadline = Duration::from_secs(self.settings.timeout_secs);
        let answer = match tokio::time::timeout(deadline, self.chat.chat(&messages)).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                // Generation is best effort once retrieval succeeded. Hand the
                // caller the top passage instead of a 500. With nothing
                // retrieved there is no partial answer to give.
                tracing::warn!(
                    "answer generation timed out after {}s",
                    self.settings.timeout_secs
                );
                match results.first() {
                    Some(top) => timeout_answer(top),
                    None => return Err(ApiError::GenerationTimeout),
                }
            }
        };

        Ok(AnswerResult {
            answer,
            sources,
            degraded: outcome.degraded,
        })
    }
}

fn timeout_answer(top: &RetrievalResult) -> String {
    format!(
        "The answer is taking too long to generate. \
         Here is the most relevant passage found in the documents:\n\n{}",
        top.text
    )
}
