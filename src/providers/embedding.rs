//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// External embedding service contract.
///
/// All vectors produced under one provider instance share a model and
/// revision; the pipeline records the fingerprint alongside index entries so
/// that mixing vectors from different models is caught at query time.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts in one request.
    ///
    /// Default implementation calls `embed` sequentially; implementations
    /// with native batch endpoints should override.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Fixed dimensionality of every vector this provider produces
    fn dimensions(&self) -> usize;

    /// Model identifier (e.g. "nomic-embed-text")
    fn model_id(&self) -> &str;

    /// Model revision; bumped on upgrades that change the vector space
    fn model_revision(&self) -> &str;

    /// Model fingerprint recorded in the index
    fn fingerprint(&self) -> String {
        format!("{}@{}", self.model_id(), self.model_revision())
    }

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
