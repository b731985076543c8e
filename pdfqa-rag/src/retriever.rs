//! Query-time chunk selection.
//!
//! The [`Retriever`] embeds the question with the same provider the index was built with
//! and selects chunks by plain similarity or by maximal marginal relevance (MMR). MMR
//! trades a little relevance for coverage, which matters when a document repeats itself:
//! plain top-k then tends to fill every slot with the same passage.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::RetrievalStrategy;
use crate::document::ScoredChunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::similarity::cosine_similarity;
use crate::timeout::with_timeout;

/// Selects the chunks handed to the answer synthesizer.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{Retriever, RetrievalStrategy};
///
/// let retriever = Retriever::new(embedder, RetrievalStrategy::mmr());
/// let chunks = retriever.retrieve(&index, "What is the warranty period?", 3).await?;
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    strategy: RetrievalStrategy,
    request_timeout: Option<Duration>,
}

impl Retriever {
    /// Create a retriever using `embedder` for queries.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, strategy: RetrievalStrategy) -> Self {
        Self { embedder, strategy, request_timeout: None }
    }

    /// Bound the query embedding call by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The configured strategy.
    pub fn strategy(&self) -> RetrievalStrategy {
        self.strategy
    }

    /// Retrieve up to `k` chunks for `query`, in selection order.
    ///
    /// An empty index yields an empty result without calling the embedder, provided the
    /// embedder matches the one the index was built with.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`, the strategy is invalid, or the query
    ///   embedder does not match the one the index was built with
    /// - [`RagError::EmbeddingError`] if the query cannot be embedded
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        self.strategy.validate()?;

        self.check_compatible(index)?;
        if index.is_empty().await {
            debug!("index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let query_embedding = self.embed_query(query).await?;
        self.select(index, &query_embedding, k).await
    }

    /// Select chunks for an already embedded query.
    pub(crate) async fn select(
        &self,
        index: &VectorIndex,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let results = match self.strategy {
            RetrievalStrategy::Similarity => index.query(query_embedding, k).await?,
            RetrievalStrategy::Mmr { lambda, fetch_k } => {
                let hits = index.search(query_embedding, fetch_k.max(k)).await?;
                let embeddings: Vec<&[f32]> =
                    hits.iter().map(|h| h.entry.embedding.as_slice()).collect();
                let picked = maximal_marginal_relevance(query_embedding, &embeddings, k, lambda);
                picked
                    .into_iter()
                    .map(|i| ScoredChunk {
                        chunk: hits[i].entry.chunk.clone(),
                        score: hits[i].score,
                    })
                    .collect()
            }
        };

        info!(
            strategy = self.strategy.name(),
            k,
            result_count = results.len(),
            "retrieval completed"
        );
        Ok(results)
    }

    /// Reject querying an index with a different embedding model.
    pub(crate) fn check_compatible(&self, index: &VectorIndex) -> Result<()> {
        if self.embedder.model_id() != index.model_id()
            || self.embedder.dimensions() != index.dimensions()
        {
            return Err(RagError::ConfigError(format!(
                "query embedder '{}' ({} dims) does not match index embedder '{}' ({} dims)",
                self.embedder.model_id(),
                self.embedder.dimensions(),
                index.model_id(),
                index.dimensions()
            )));
        }
        Ok(())
    }

    pub(crate) async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let provider = self.embedder.model_id().to_string();
        with_timeout(self.request_timeout, self.embedder.embed(query), |limit| {
            RagError::EmbeddingError {
                provider: provider.clone(),
                message: format!("query embedding timed out after {limit:?}"),
            }
        })
        .await
        .inspect_err(|e| error!(error = %e, "query embedding failed"))
    }
}

/// Pick up to `k` candidate indices by maximal marginal relevance.
///
/// Each step takes the candidate maximising
/// `lambda * sim(candidate, query) - (1 - lambda) * max(sim(candidate, selected))`.
/// The first pick is therefore the most relevant candidate. Ties go to the candidate that
/// comes first in `candidates`.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let relevance: Vec<f32> = candidates.iter().map(|c| cosine_similarity(query, c)).collect();
    // Highest similarity to anything selected so far, per candidate.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut available: Vec<bool> = vec![true; candidates.len()];

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate_relevance) in relevance.iter().enumerate() {
            if !available[i] {
                continue;
            }
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[i] };
            let score = lambda * candidate_relevance - (1.0 - lambda) * penalty;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((pick, _)) = best else { break };
        available[pick] = false;
        selected.push(pick);

        for (i, candidate) in candidates.iter().enumerate() {
            if available[i] {
                redundancy[i] = redundancy[i].max(cosine_similarity(candidate, candidates[pick]));
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_one_is_plain_relevance_order() {
        let query = [1.0, 0.0];
        let a = [0.9, 0.1];
        let b = [0.5, 0.5];
        let c = [1.0, 0.0];
        let picked = maximal_marginal_relevance(&query, &[&a, &b, &c], 3, 1.0);
        assert_eq!(picked, vec![2, 0, 1]);
    }

    #[test]
    fn prefers_distinct_candidate_over_near_duplicate() {
        let query = [1.0, 0.0, 0.3];
        let first = [1.0, 0.0, 0.0];
        let near_duplicate = [0.99, 0.01, 0.0];
        let distinct = [0.5, 0.0, 0.8];
        let picked =
            maximal_marginal_relevance(&query, &[&first, &near_duplicate, &distinct], 2, 0.5);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn stops_when_candidates_run_out() {
        let query = [1.0];
        let only = [1.0];
        assert_eq!(maximal_marginal_relevance(&query, &[&only], 5, 0.5), vec![0]);
        assert!(maximal_marginal_relevance(&query, &[], 5, 0.5).is_empty());
    }
}
