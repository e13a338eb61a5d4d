use async_trait::async_trait;

use crate::core::errors::RagError;

use super::types::{BatchProgressFn, GenerationHooks, GenerationRequest};

/// Embedding capability. One implementation per [`super::types::ProviderKind`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, RagError>;

    /// Embed a batch, reporting fractional progress in `[0, 100]`,
    /// monotonically increasing. A failure on any item aborts the whole
    /// batch; partial batches are never returned.
    async fn embed_batch(
        &self,
        texts: &[String],
        model_id: &str,
        on_progress: Option<&BatchProgressFn>,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (idx, text) in texts.iter().enumerate() {
            vectors.push(self.embed(text, model_id).await?);
            if let Some(cb) = on_progress {
                cb((idx + 1) as f32 / texts.len() as f32 * 100.0);
            }
            tokio::task::yield_now().await;
        }
        Ok(vectors)
    }
}

/// Text generation capability.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one generation. Every produced token is delivered through
    /// `hooks.on_token`, and the returned string equals the concatenation of
    /// all delivered tokens. A raised interrupt stops generation at the next
    /// token boundary and returns the partial text as `Ok`.
    async fn generate(
        &self,
        request: GenerationRequest,
        hooks: &GenerationHooks,
    ) -> Result<String, RagError>;
}
