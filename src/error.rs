//! Error types for the RAG pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document structure could not be reconciled with its text
    #[error("Malformed input for '{source_uri}': {message}")]
    MalformedInput { source_uri: String, message: String },

    /// Embedding service failed after all retries
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Query vectors and index vectors come from different embedding models
    #[error("Embedding model mismatch: index built with '{index}', query uses '{query}'; reindex required")]
    EmbeddingVersionMismatch { index: String, query: String },

    /// Vector index failure
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Language model failure during answer synthesis
    #[error("Language model error: {0}")]
    LanguageModel(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed input error
    pub fn malformed(source_uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            source_uri: source_uri.into(),
            message: message.into(),
        }
    }

    /// Create an embedding unavailability error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    /// Create a language model error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::LanguageModel(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same operation later can reasonably succeed.
    ///
    /// Configuration-level failures (model mismatch, bad config, malformed
    /// input) are not transient: they require operator action, not a retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_)
                | Self::IndexUnavailable(_)
                | Self::LanguageModel(_)
                | Self::Http(_)
                | Self::Io(_)
        )
    }
}
