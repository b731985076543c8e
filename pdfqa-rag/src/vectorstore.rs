//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::Chunk;
use crate::error::Result;

/// A chunk together with the embedding it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    /// The stored chunk.
    pub chunk: Chunk,
    /// The embedding computed for `chunk.text`.
    pub embedding: Vec<f32>,
}

/// A search hit: the stored entry and its similarity to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    /// The matching entry.
    pub entry: StoredChunk,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// An append-only storage backend for embedded chunks with similarity search.
///
/// Stores are owned by exactly one [`VectorIndex`](crate::VectorIndex); the index
/// serialises writes, so implementations only need to be safe for concurrent reads.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.insert(entries).await?;
/// let hits = store.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append embedded chunks.
    async fn insert(&self, entries: Vec<StoredChunk>) -> Result<()>;

    /// Return true if a chunk with exactly this text is stored.
    async fn contains_text(&self, text: &str) -> Result<bool>;

    /// Search for the `top_k` most similar entries to the given embedding.
    ///
    /// Returns hits ordered by descending similarity; ties keep insertion order.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<StoreHit>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
