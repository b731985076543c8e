//! The seam between the index and whatever service turns text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to fixed-width vectors.
///
/// An index remembers the [`model_id`](EmbeddingProvider::model_id) and
/// [`dimensions`](EmbeddingProvider::dimensions) it was built with, and queries through a
/// provider that reports anything else are rejected.
///
/// ```rust,ignore
/// let vector = provider.embed("What is the notice period?").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// One vector per input, in input order.
    ///
    /// Falls back to one [`embed`](EmbeddingProvider::embed) call per text; hosted services
    /// that accept a list in one request override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    fn model_id(&self) -> &str;
}
