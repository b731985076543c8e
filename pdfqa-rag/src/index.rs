//! The session-scoped vector index.
//!
//! A [`VectorIndex`] owns the embedded chunks of one session. It is built in one blocking
//! step (every chunk embedded, or nothing stored) and is then read-only for queries.
//! Later [`add`](VectorIndex::add) calls are serialised by a per-index build lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::document::{Chunk, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::timeout::with_timeout;
use crate::vectorstore::{StoreHit, StoredChunk, VectorStore};

/// Default number of texts sent per embedding request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// An embedding index over the chunks of the current session.
///
/// Safe to share between tasks; queries never mutate it.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::VectorIndex;
///
/// let index = VectorIndex::build(chunks, embedder).await?;
/// let hits = index.query(&query_vector, 3).await?;
/// ```
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    model_id: String,
    dimensions: usize,
    embed_batch_size: usize,
    request_timeout: Option<Duration>,
    build_lock: Mutex<()>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model_id", &self.model_id)
            .field("dimensions", &self.dimensions)
            .field("embed_batch_size", &self.embed_batch_size)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Create a new [`VectorIndexBuilder`].
    pub fn builder() -> VectorIndexBuilder {
        VectorIndexBuilder::default()
    }

    /// Embed `chunks` with `embedder` into a fresh in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if any chunk fails to embed; no partial index
    /// is produced.
    pub async fn build(
        chunks: impl IntoIterator<Item = Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let index = Self::builder().embedding_provider(embedder).build()?;
        index.add(chunks).await?;
        Ok(index)
    }

    /// Identifier of the embedding model the index was built with.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Dimensionality of the stored embeddings.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    /// Returns true if no chunk is stored.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }

    /// Embed and append chunks, returning how many were newly stored.
    ///
    /// Chunks whose text is already indexed (or repeated within `chunks`) are skipped
    /// without being embedded. Either every new chunk is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if an embedding request fails, times out, or
    /// returns the wrong number or size of vectors.
    pub async fn add(&self, chunks: impl IntoIterator<Item = Chunk>) -> Result<usize> {
        let _guard = self.build_lock.lock().await;

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for chunk in chunks {
            if seen.contains(&chunk.text) || self.store.contains_text(&chunk.text).await? {
                debug!(text_len = chunk.text.len(), "skipping already indexed chunk");
                continue;
            }
            seen.insert(chunk.text.clone());
            pending.push(chunk);
        }

        if pending.is_empty() {
            return Ok(0);
        }

        let mut entries = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embed_batch(&texts).await?;
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                entries.push(StoredChunk { chunk: chunk.clone(), embedding });
            }
        }

        let added = entries.len();
        self.store.insert(entries).await?;
        info!(chunk_count = added, model = %self.model_id, "indexed chunks");
        Ok(added)
    }

    /// Rank stored chunks by cosine similarity to `vector`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k == 0` and [`RagError::IndexError`] if the
    /// vector's dimensionality does not match the index.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.search(vector, k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| ScoredChunk { chunk: hit.entry.chunk, score: hit.score })
            .collect())
    }

    /// Like [`query`](Self::query) but keeps the stored embeddings, which MMR needs.
    pub(crate) async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        if vector.len() != self.dimensions {
            return Err(RagError::IndexError(format!(
                "query vector has {} dimensions, index has {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.store.search(vector, k).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = self.model_id.clone();
        let embeddings = with_timeout(
            self.request_timeout,
            self.embedder.embed_batch(texts),
            |limit| RagError::EmbeddingError {
                provider: provider.clone(),
                message: format!("request timed out after {limit:?}"),
            },
        )
        .await
        .inspect_err(|e| error!(error = %e, batch_size = texts.len(), "embedding failed"))?;

        if embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider,
                message: format!(
                    "expected {} embeddings, provider returned {}",
                    texts.len(),
                    embeddings.len()
                ),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(RagError::EmbeddingError {
                provider,
                message: format!(
                    "expected {}-dimensional embeddings, got {}",
                    self.dimensions,
                    bad.len()
                ),
            });
        }
        Ok(embeddings)
    }
}

/// Builder for constructing a [`VectorIndex`].
///
/// Only the embedding provider is required; the store defaults to
/// [`InMemoryVectorStore`].
#[derive(Default)]
pub struct VectorIndexBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    embed_batch_size: Option<usize>,
    request_timeout: Option<Duration>,
}

impl VectorIndexBuilder {
    /// Set the embedding provider. The same provider must be used for queries.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Use a different store backend. The store must be empty.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the maximum number of texts per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = Some(size);
        self
    }

    /// Bound every embedding request by `timeout`.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build an empty [`VectorIndex`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedding provider is missing or the batch
    /// size is zero.
    pub fn build(self) -> Result<VectorIndex> {
        let embedder = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let embed_batch_size = self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE);
        if embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(VectorIndex {
            store: self.vector_store.unwrap_or_else(|| Arc::new(InMemoryVectorStore::new())),
            model_id: embedder.model_id().to_string(),
            dimensions: embedder.dimensions(),
            embedder,
            embed_batch_size,
            request_timeout: self.request_timeout,
            build_lock: Mutex::new(()),
        })
    }
}
