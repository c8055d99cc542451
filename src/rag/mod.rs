//! Retrieval-augmented generation pipeline.
//!
//! This module provides:
//! - `IngestService`: extracts, chunks, embeds and indexes uploaded documents
//! - `AnswerService`: embeds a question, retrieves matching chunks and
//!   generates a grounded answer
//! - `MemoryVectorStore`: the in-memory cosine-similarity index behind both

pub mod answer;
pub mod chunker;
pub mod context_builder;
pub mod extract;
pub mod ingest;
pub mod store;

pub use answer::{AnswerResult, AnswerService, SourceRef};
pub use chunker::{chunk_text, ChunkConfig};
pub use ingest::{IngestReport, IngestService, StagedFile};
pub use store::{IndexedVector, MemoryVectorStore, RetrievalResult};
