//! Embedding and chat providers behind ordered fallback chains.
//!
//! `openrouter` is the primary backend for both concerns, `gemini` the
//! secondary. Which backends actually join a chain is decided at startup from
//! credential presence; the services here only see trait objects.

pub mod gemini;
pub mod openrouter;
pub mod provider;
pub mod service;
pub mod types;

pub use provider::{ChatBackend, EmbeddingBackend};
pub use service::{ChatService, EmbeddingOutcome, EmbeddingService};
pub use types::ChatMessage;
