//! Vector index: nearest-neighbor search over chunk embeddings
//!
//! The index is a derived, rebuildable projection of chunk embeddings; the
//! chunk's own embedding is the source of truth. Entries carry enough
//! metadata (document, version, section path, char range, model
//! fingerprint, staleness) to rebuild the retriever's filters without
//! recomputation.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::Chunk;

pub use memory::MemoryIndex;

/// Metadata stored alongside each vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Owning document
    pub document_id: Uuid,
    /// Source location of the owning document
    pub source_uri: String,
    /// Document version this entry belongs to
    pub version: u32,
    /// Heading breadcrumb of the chunk
    pub section_path: Vec<String>,
    /// Chunk position within the document
    pub sequence_index: u32,
    /// Chunk range in the document's canonical text
    pub char_start: usize,
    pub char_end: usize,
    /// Chunk text, kept for answer assembly
    pub text: String,
    /// Embedding model fingerprint the vector was computed with
    pub model_fingerprint: String,
    /// Superseded by a newer document version; excluded from default queries
    pub stale: bool,
}

/// One record owned by the vector index
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Chunk this entry projects
    pub chunk_id: Uuid,
    /// Embedding vector
    pub embedding: Vec<f32>,
    /// Filter and rebuild metadata
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Build an entry from an embedded chunk
    pub fn from_chunk(
        chunk: &Chunk,
        source_uri: &str,
        version: u32,
        model_fingerprint: &str,
    ) -> Option<Self> {
        let embedding = chunk.embedding.clone()?;
        Some(Self {
            chunk_id: chunk.id,
            embedding,
            metadata: EntryMetadata {
                document_id: chunk.document_id,
                source_uri: source_uri.to_string(),
                version,
                section_path: chunk.section_path.clone(),
                sequence_index: chunk.sequence_index,
                char_start: chunk.start_offset,
                char_end: chunk.end_offset,
                text: chunk.text.clone(),
                model_fingerprint: model_fingerprint.to_string(),
                stale: false,
            },
        })
    }
}

/// Nearest-neighbor query
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query vector
    pub vector: Vec<f32>,
    /// Maximum number of hits
    pub k: usize,
    /// Expected embedding model fingerprint; a differing entry fingerprint
    /// is a configuration error, not a low-scoring match
    pub model_fingerprint: Option<String>,
    /// Include entries from staled document versions
    pub include_stale: bool,
}

/// One search hit
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Matched chunk
    pub chunk_id: Uuid,
    /// Cosine similarity, higher is better
    pub score: f32,
    /// Entry metadata
    pub metadata: EntryMetadata,
}

/// Store of (chunk_id, embedding, metadata) answering top-K similarity
/// queries.
///
/// Implementations must keep upserts atomic per chunk_id: a reader mid-query
/// sees either the pre-upsert or the post-upsert entry, never a partial
/// write. Results are ordered by non-increasing similarity with ties broken
/// by ascending `sequence_index`, then chunk id.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the entry for a chunk. Idempotent per chunk_id.
    async fn upsert(&self, entry: IndexEntry) -> Result<()>;

    /// Upsert many entries
    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in entries {
            self.upsert(entry).await?;
        }
        Ok(())
    }

    /// Top-K most similar entries to the query vector
    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchHit>>;

    /// Mark entries of a document with version below `below_version` stale.
    /// Returns the number of entries affected.
    async fn mark_stale(&self, document_id: Uuid, below_version: u32) -> Result<usize>;

    /// Drop stale entries. Returns the number removed.
    async fn compact(&self) -> Result<usize>;

    /// Number of live (non-stale) entries
    async fn len(&self) -> Result<usize>;

    /// Whether the index holds no live entries
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Implementation name for logging
    fn name(&self) -> &str;
}

/// Cosine similarity; zero-magnitude vectors score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
