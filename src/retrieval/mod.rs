//! Query-time retrieval: candidate search, filtering and deduplication

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::embedding::EmbedderAdapter;
use crate::error::Result;
use crate::index::{EntryMetadata, SearchQuery, VectorIndex};

/// One ranked retrieval candidate. Ephemeral, produced per query.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Retrieved chunk
    pub chunk_id: Uuid,
    /// Similarity score, higher is better
    pub score: f32,
    /// Position in the final ranking, starting at 0
    pub rank: u32,
    /// Chunk metadata from the index
    pub metadata: EntryMetadata,
}

/// Result of a retrieval pass
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    /// Ranked, deduplicated chunks
    Hits(Vec<RetrievalResult>),
    /// Nothing scored above the similarity threshold; the synthesizer
    /// should decline rather than fabricate grounding
    NoRelevantContext,
}

/// Per-query overrides of the configured retrieval parameters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Override `top_k`
    pub top_k: Option<usize>,
    /// Override `min_similarity`
    pub min_similarity: Option<f32>,
}

/// Converts a question into a ranked list of candidate chunks
pub struct Retriever {
    embedder: Arc<EmbedderAdapter>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Create a retriever
    pub fn new(
        embedder: Arc<EmbedderAdapter>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Retrieve the chunks most relevant to `question`.
    ///
    /// Queries a candidate set several times larger than `top_k` to absorb
    /// losses from staleness filtering and overlap deduplication, then
    /// truncates. No two returned results overlap in character range within
    /// one document; the higher-scoring chunk wins.
    pub async fn retrieve(
        &self,
        question: &str,
        options: RetrievalOptions,
    ) -> Result<RetrievalOutcome> {
        let top_k = options.top_k.unwrap_or(self.config.top_k);
        let min_similarity = options.min_similarity.unwrap_or(self.config.min_similarity);

        let vector = self.embedder.embed_query(question).await?;

        let candidates = self
            .index
            .search(SearchQuery {
                vector,
                k: top_k * self.config.candidate_multiplier,
                model_fingerprint: Some(self.embedder.fingerprint()),
                include_stale: false,
            })
            .await?;

        let mut accepted: Vec<RetrievalResult> = Vec::new();
        for hit in candidates {
            if hit.score < min_similarity {
                // candidates arrive in descending score order
                break;
            }
            let overlaps_accepted = accepted.iter().any(|r| {
                r.metadata.document_id == hit.metadata.document_id
                    && r.metadata.char_start < hit.metadata.char_end
                    && hit.metadata.char_start < r.metadata.char_end
            });
            if overlaps_accepted {
                continue;
            }
            accepted.push(RetrievalResult {
                chunk_id: hit.chunk_id,
                score: hit.score,
                rank: accepted.len() as u32,
                metadata: hit.metadata,
            });
            if accepted.len() == top_k {
                break;
            }
        }

        if accepted.is_empty() {
            tracing::info!(question, min_similarity, "no relevant context found");
            return Ok(RetrievalOutcome::NoRelevantContext);
        }

        tracing::debug!(
            question,
            hits = accepted.len(),
            top_score = accepted[0].score,
            "retrieved chunks"
        );
        Ok(RetrievalOutcome::Hits(accepted))
    }
}
