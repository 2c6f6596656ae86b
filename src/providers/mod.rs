//! Provider abstractions for the external embedding and language model
//! services
//!
//! The pipeline only ever talks to these traits; concrete backends (local
//! Ollama here, anything else downstream) plug in without touching the
//! retrieval or synthesis code.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm, OllamaProvider};
