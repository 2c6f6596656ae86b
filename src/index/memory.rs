//! In-memory vector index
//!
//! Flat cosine scan over a concurrent map. Upserts replace the whole entry
//! under the chunk_id key, so concurrent readers never observe a partial
//! write. Durable or approximate backends live behind the same trait.

use std::cmp::Ordering;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::{cosine_similarity, IndexEntry, SearchHit, SearchQuery, VectorIndex};

/// Exact nearest-neighbor index held in memory
#[derive(Default)]
pub struct MemoryIndex {
    entries: DashMap<Uuid, IndexEntry>,
}

impl MemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<()> {
        self.entries.insert(entry.chunk_id, entry);
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchHit>> {
        if query.k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for entry in self.entries.iter() {
            if entry.metadata.stale && !query.include_stale {
                continue;
            }
            if let Some(expected) = &query.model_fingerprint {
                if &entry.metadata.model_fingerprint != expected {
                    return Err(Error::EmbeddingVersionMismatch {
                        index: entry.metadata.model_fingerprint.clone(),
                        query: expected.clone(),
                    });
                }
            }
            let score = cosine_similarity(&query.vector, &entry.embedding);
            hits.push(SearchHit {
                chunk_id: entry.chunk_id,
                score,
                metadata: entry.metadata.clone(),
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.metadata.sequence_index.cmp(&b.metadata.sequence_index))
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(query.k);
        Ok(hits)
    }

    async fn mark_stale(&self, document_id: Uuid, below_version: u32) -> Result<usize> {
        let mut affected = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.metadata.document_id == document_id
                && entry.metadata.version < below_version
                && !entry.metadata.stale
            {
                entry.metadata.stale = true;
                affected += 1;
            }
        }
        tracing::debug!(%document_id, below_version, affected, "marked entries stale");
        Ok(affected)
    }

    async fn compact(&self) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.metadata.stale);
        Ok(before - self.entries.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.metadata.stale)
            .count())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
