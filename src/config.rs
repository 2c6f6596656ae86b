//! Configuration for the RAG pipeline

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.chunking.overlap_fraction) {
            return Err(Error::Config(
                "chunking.overlap_fraction must be in [0.0, 1.0)".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be > 0".into()));
        }
        if self.retrieval.candidate_multiplier == 0 {
            return Err(Error::Config(
                "retrieval.candidate_multiplier must be > 0".into(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Fraction of the chunk size shared between consecutive chunks
    pub overlap_fraction: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            overlap_fraction: 0.15,
        }
    }
}

impl ChunkingConfig {
    /// Overlap between consecutive chunks, in characters
    pub fn overlap(&self) -> usize {
        (self.chunk_size as f32 * self.overlap_fraction) as usize
    }
}

/// Embedding adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Maximum number of texts per embedding request
    pub batch_size: usize,
    /// Retries for transient embedding failures
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_retries: 3,
            retry_base_delay_ms: 250,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks returned to the synthesizer
    pub top_k: usize,
    /// Candidate set size as a multiple of top_k, to absorb dedup and
    /// staleness losses
    pub candidate_multiplier: usize,
    /// Minimum cosine similarity for a chunk to count as relevant
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            candidate_multiplier: 4,
            min_similarity: 0.25,
        }
    }
}

/// LLM provider configuration (Ollama-compatible HTTP endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the model server
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Embedding model revision, part of the index fingerprint
    pub embed_model_revision: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Generation model name
    pub generate_model: String,
    /// Sampling temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            embed_model_revision: "v1.5".to_string(),
            dimensions: 768,
            generate_model: "phi3".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

/// Concurrency and timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Parallel document ingestion workers (defaults to CPU count, capped at 8)
    pub parallel_documents: Option<usize>,
    /// Timeout for ingesting a single document, in seconds
    pub document_timeout_secs: u64,
    /// Timeout for answering a single query, in seconds
    pub query_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            document_timeout_secs: 300,
            query_timeout_secs: 120,
        }
    }
}

impl ProcessingConfig {
    /// Effective ingestion worker count
    pub fn workers(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RagConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_full_overlap() {
        let mut config = RagConfig::default();
        config.chunking.overlap_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_derived_from_fraction() {
        let chunking = ChunkingConfig {
            chunk_size: 1000,
            overlap_fraction: 0.15,
        };
        assert_eq!(chunking.overlap(), 150);
    }
}
