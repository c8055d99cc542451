//! In-memory vector index with cosine similarity search.
//!
//! The store is the only shared mutable state in the service. All access goes
//! through an async `RwLock`, so concurrent queries share a read lock and a
//! batch upsert is never observable half-applied.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::errors::ApiError;

/// Provenance carried alongside every indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating filename.
    pub source: String,
    /// Page number, when the source format has pages.
    pub page: Option<u32>,
}

/// A chunk ready for indexing: embedding plus the text it was computed from.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub text: String,
}

/// One similarity-search hit. `score` is cosine similarity in [-1, 1].
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
    pub text: String,
}

#[derive(Default)]
struct StoreInner {
    items: Vec<IndexedVector>,
    /// Pinned on the first upsert; upserts with another dimension are
    /// rejected so one store never mixes embedding spaces.
    dimension: Option<usize>,
}

pub struct MemoryVectorStore {
    inner: RwLock<StoreInner>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Insert or replace vectors by id. The whole batch is validated before
    /// anything is applied, so a rejected batch leaves the store untouched.
    pub async fn upsert(&self, items: Vec<IndexedVector>) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;

        let mut dimension = inner.dimension;
        for item in &items {
            let len = item.values.len();
            if len == 0 {
                return Err(ApiError::VectorStore(format!(
                    "chunk {} has an empty embedding",
                    item.id
                )));
            }
            match dimension {
                None => dimension = Some(len),
                Some(expected) if expected != len => {
                    return Err(ApiError::VectorStore(format!(
                        "dimension mismatch for chunk {}: store holds {}-dimensional vectors, got {}",
                        item.id, expected, len
                    )));
                }
                Some(_) => {}
            }
        }

        inner.dimension = dimension;
        for item in items {
            if let Some(existing) = inner.items.iter_mut().find(|entry| entry.id == item.id) {
                *existing = item;
            } else {
                inner.items.push(item);
            }
        }

        Ok(())
    }

    /// Linear scan over every stored vector, sorted by descending cosine
    /// similarity. The sort is stable, so equal scores keep insertion order.
    /// An empty store returns an empty list, never an error.
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Vec<RetrievalResult> {
        let inner = self.inner.read().await;
        if inner.items.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut results: Vec<RetrievalResult> = inner
            .items
            .iter()
            .map(|item| RetrievalResult {
                id: item.id.clone(),
                score: cosine_similarity(vector, &item.values),
                metadata: item.metadata.clone(),
                text: item.text.clone(),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(top_k);
        results
    }

    /// Drop everything and unpin the dimension.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.items.clear();
        inner.dimension = None;
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }

    pub async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.dimension
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity clamped to [-1, 1]. Mismatched lengths and
/// zero-magnitude vectors score 0 rather than erroring, so one malformed
/// entry cannot poison a whole query.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}
