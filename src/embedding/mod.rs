//! Embedder adapter: batching, retry and caching in front of the provider
//!
//! The adapter owns the attempt budget for embedding calls. After retries
//! are exhausted it fails with `EmbeddingUnavailable`, which aborts
//! ingestion for the affected chunks only; vectors already computed stay in
//! the cache, so a later re-ingestion of unchanged text does not recompute
//! them.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::sleep;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Batching, retrying, caching wrapper around an [`EmbeddingProvider`]
pub struct EmbedderAdapter {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    /// Vectors keyed by content hash of (model id, revision, text)
    cache: DashMap<String, Vec<f32>>,
}

impl EmbedderAdapter {
    /// Create an adapter
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self {
            provider,
            config,
            cache: DashMap::new(),
        }
    }

    /// Model fingerprint of the wrapped provider
    pub fn fingerprint(&self) -> String {
        self.provider.fingerprint()
    }

    /// Vector dimensionality of the wrapped provider
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Check the wrapped provider
    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }

    /// Embed a query string
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(std::slice::from_ref(&text.to_string())).await?;
        Ok(vectors.remove(0))
    }

    /// Embed many texts, preserving order.
    ///
    /// Cached texts are served without a provider call; the rest go out in
    /// batches of at most `batch_size`.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = self.cache_key(text);
            if let Some(vector) = self.cache.get(&key) {
                results[i] = Some(vector.clone());
            } else {
                misses.push(i);
            }
        }

        if !misses.is_empty() {
            tracing::debug!(
                total = texts.len(),
                cached = texts.len() - misses.len(),
                "embedding texts"
            );
        }

        for batch in misses.chunks(self.config.batch_size) {
            let batch_texts: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.embed_batch_with_retry(&batch_texts).await?;
            if vectors.len() != batch_texts.len() {
                return Err(Error::embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch_texts.len()
                )));
            }
            for (&i, vector) in batch.iter().zip(vectors) {
                self.cache.insert(self.cache_key(&texts[i]), vector.clone());
                results[i] = Some(vector);
            }
        }

        results
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::internal("embedding slot left unfilled")))
            .collect()
    }

    async fn embed_batch_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            match self.provider.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = Duration::from_millis(
                            self.config.retry_base_delay_ms * 2u64.pow(attempt),
                        );
                        tracing::warn!(
                            attempt = attempt + 1,
                            max = self.config.max_retries + 1,
                            ?delay,
                            "embedding batch failed, retrying"
                        );
                        sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::embedding(format!(
            "retries exhausted: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.provider.model_id().as_bytes());
        hasher.update([0]);
        hasher.update(self.provider.model_revision().as_bytes());
        hasher.update([0]);
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }
}
