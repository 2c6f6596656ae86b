//! Language model provider trait

use async_trait::async_trait;

use crate::error::Result;

/// External language model contract: one capability, prompt in, text out.
///
/// Citation-identifier parsing stays inside the answer synthesizer so that
/// provider swaps never ripple through the pipeline.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model in use
    fn model(&self) -> &str;
}
