//! Ingestion pipeline: staged uploads in, indexed vectors out.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::llm::EmbeddingService;

use super::chunker::{chunk_text, ChunkConfig};
use super::extract::extract_text;
use super::store::{ChunkMetadata, IndexedVector, MemoryVectorStore};

/// An uploaded file, already buffered out of the request body.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Number of chunks written to the store.
    pub inserted: usize,
    /// True when the chunks were indexed with degraded-mode embeddings.
    pub degraded: bool,
}

struct PendingChunk {
    id: String,
    metadata: ChunkMetadata,
    text: String,
}

/// Runs extract -> chunk -> embed -> upsert for a batch of uploads.
///
/// The batch is atomic: chunks from every file are staged first, then
/// embedded in one call and committed in one upsert, so a failing file means
/// nothing from the batch reaches the store.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<MemoryVectorStore>,
    embeddings: EmbeddingService,
    chunking: ChunkConfig,
}

impl IngestService {
    pub fn new(
        store: Arc<MemoryVectorStore>,
        embeddings: EmbeddingService,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            chunking,
        }
    }

    pub async fn ingest(&self, files: Vec<StagedFile>) -> Result<IngestReport, ApiError> {
        if files.is_empty() {
            return Err(ApiError::BadRequest("No files uploaded".to_string()));
        }

        let mut pending: Vec<PendingChunk> = Vec::new();
        for file in files {
            let name = file.name;
            let text = extract_text(file.bytes, &name).await?;
            let pieces = chunk_text(&text, &self.chunking);
            tracing::info!("split {} into {} chunks", name, pieces.len());

            // Each upload of a file gets a fresh document id, so re-uploading
            // appends new chunks instead of replacing the old ones.
            let document_id = Uuid::new_v4().to_string();
            for (index, piece) in pieces.into_iter().enumerate() {
                pending.push(PendingChunk {
                    id: format!("{}_{}", document_id, index),
                    metadata: ChunkMetadata {
                        source: name.clone(),
                        page: None,
                    },
                    text: piece,
                });
            }
        }

        let texts: Vec<String> = pending.iter().map(|chunk| chunk.text.clone()).collect();
        let outcome = self.embeddings.embed(&texts).await?;

        let items: Vec<IndexedVector> = pending
            .into_iter()
            .zip(outcome.vectors)
            .map(|(chunk, values)| IndexedVector {
                id: chunk.id,
                values,
                metadata: chunk.metadata,
                text: chunk.text,
            })
            .collect();

        let inserted = items.len();
        self.store.upsert(items).await?;
        tracing::info!("ingested {} chunks (degraded: {})", inserted, outcome.degraded);

        Ok(IngestReport {
            inserted,
            degraded: outcome.degraded,
        })
    }
}
