//! Session-lifetime chunk storage with brute-force cosine search.

use std::cmp::Ordering;
use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::similarity::cosine_similarity;
use crate::vectorstore::{StoreHit, StoredChunk, VectorStore};

#[derive(Debug, Default)]
struct Entries {
    items: Vec<StoredChunk>,
    texts: HashSet<String>,
}

/// The default [`VectorStore`]: a `Vec` scanned on every search.
///
/// Readers share a `RwLock`, so parallel queries never wait on each other; only
/// [`insert`](VectorStore::insert) takes the write side.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Entries>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, batch: Vec<StoredChunk>) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.texts.extend(batch.iter().map(|stored| stored.chunk.text.clone()));
        guard.items.extend(batch);
        Ok(())
    }

    async fn contains_text(&self, text: &str) -> Result<bool> {
        Ok(self.entries.read().await.texts.contains(text))
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<StoreHit>> {
        let guard = self.entries.read().await;
        let mut hits: Vec<StoreHit> = guard
            .items
            .iter()
            .map(|stored| StoreHit {
                score: cosine_similarity(&stored.embedding, embedding),
                entry: stored.clone(),
            })
            .collect();

        // sort_by is stable: ties keep insertion order.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.items.len()
    }
}
