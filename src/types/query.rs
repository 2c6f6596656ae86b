//! Query request types and the per-query state machine

use serde::{Deserialize, Serialize};

/// Query request for grounded question answering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve (overrides config when set)
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Minimum similarity threshold (overrides config when set)
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

impl QueryRequest {
    /// Create a new query with default retrieval settings
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            min_similarity: None,
        }
    }

    /// Override the number of results to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Override the similarity threshold
    pub fn with_min_similarity(mut self, threshold: f32) -> Self {
        self.min_similarity = Some(threshold);
        self
    }
}

/// Lifecycle of a single query.
///
/// `Received → Embedding → Retrieving → Synthesizing → {Answered, Declined, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    /// Query accepted, nothing started yet
    Received,
    /// Embedding the question
    Embedding,
    /// Searching the vector index
    Retrieving,
    /// Building the prompt and calling the language model
    Synthesizing,
    /// Answer produced (possibly ungrounded)
    Answered,
    /// No relevant context found; refused to fabricate grounding
    Declined,
    /// Embedding, index or model failure after retries
    Failed,
}
