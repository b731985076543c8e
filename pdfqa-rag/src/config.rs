//! Configuration for the question-answering pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default MMR trade-off between relevance and diversity.
pub const DEFAULT_MMR_LAMBDA: f32 = 0.5;

/// Default number of candidates fetched before MMR re-ranking.
pub const DEFAULT_MMR_FETCH_K: usize = 20;

/// How the retriever selects chunks from the candidates returned by the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Plain top-k by cosine similarity.
    Similarity,
    /// Maximal marginal relevance over the `fetch_k` most similar candidates.
    Mmr {
        /// Weight of query relevance; `1.0` degenerates to plain similarity,
        /// `0.0` maximises diversity.
        lambda: f32,
        /// Size of the candidate pool (raised to `k` when smaller).
        fetch_k: usize,
    },
}

impl RetrievalStrategy {
    /// MMR with the default lambda and candidate pool.
    pub fn mmr() -> Self {
        Self::Mmr { lambda: DEFAULT_MMR_LAMBDA, fetch_k: DEFAULT_MMR_FETCH_K }
    }

    /// Check the strategy parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `lambda` is outside `[0, 1]` or `fetch_k == 0`.
    pub fn validate(&self) -> Result<()> {
        if let Self::Mmr { lambda, fetch_k } = *self {
            if !(0.0..=1.0).contains(&lambda) {
                return Err(RagError::ConfigError(format!(
                    "mmr lambda ({lambda}) must be within [0, 1]"
                )));
            }
            if fetch_k == 0 {
                return Err(RagError::ConfigError("mmr fetch_k must be greater than zero".into()));
            }
        }
        Ok(())
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Mmr { .. } => "mmr",
        }
    }
}

impl Default for RetrievalStrategy {
    fn default() -> Self {
        Self::mmr()
    }
}

/// Tunables for indexing, retrieval and answering. Defaults mirror the hosted setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Upper bound on chunk length, in characters.
    pub chunk_size: usize,
    /// Characters repeated at the start of the next chunk.
    pub chunk_overlap: usize,
    /// Number of chunks handed to the language model.
    pub top_k: usize,
    /// Chunk selection strategy.
    pub strategy: RetrievalStrategy,
    /// Maximum number of texts per embedding request.
    pub embed_batch_size: usize,
    /// Timeout applied to every embedding and generation call.
    pub request_timeout_secs: u64,
    /// Ask the model to cite the supporting chunk.
    pub cite_sources: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            chunk_overlap: 1000,
            top_k: 10,
            strategy: RetrievalStrategy::default(),
            embed_batch_size: 32,
            request_timeout_secs: 60,
            cite_sources: false,
        }
    }
}

impl RagConfig {
    /// Start from the defaults and validate on [`build`](RagConfigBuilder::build).
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Small chunks without overlap, for quick interactive sessions.
    pub fn interactive() -> Self {
        Self { chunk_size: 256, chunk_overlap: 0, top_k: 3, ..Self::default() }
    }

    /// Per-call timeout for external services; `None` when `request_timeout_secs == 0`.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate all parameters.
    ///
    /// # Errors
    ///
    /// [`RagError::ConfigError`] when the chunk size is zero or not larger than the
    /// overlap, when `top_k` or `embed_batch_size` is zero, or when the strategy is invalid.
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        self.strategy.validate()
    }
}

/// Check chunk size and overlap.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Fluent construction of a [`RagConfig`] that cannot end up inconsistent.
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from an existing configuration (for example [`RagConfig::interactive`]).
    pub fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Characters per chunk at most.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Characters shared by neighbouring chunks.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks passed to the language model.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the retrieval strategy.
    pub fn strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the maximum number of texts per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the per-call timeout for external services, in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Require the model to cite the supporting chunk.
    pub fn cite_sources(mut self, cite: bool) -> Self {
        self.config.cite_sources = cite;
        self
    }

    /// Finish, running [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Credentials and endpoint for one external inference service.
///
/// Passed explicitly to provider constructors; the library never reads the environment.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// API key or token.
    pub api_key: String,
    /// Model identifier understood by the service.
    pub model: String,
    /// Override of the service base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ServiceConfig {
    /// Create a service configuration for the given key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), model: model.into(), base_url: None }
    }

    /// Point the provider at a different endpoint (self-hosted or compatible APIs).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RagConfig::default().validate().is_ok());
        assert!(RagConfig::interactive().validate().is_ok());
    }

    #[test]
    fn overlap_not_below_chunk_size_is_rejected() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }

    #[test]
    fn lambda_out_of_range_is_rejected() {
        let strategy = RetrievalStrategy::Mmr { lambda: 1.5, fetch_k: 20 };
        assert!(RagConfig::builder().strategy(strategy).build().is_err());
    }

    #[test]
    fn strategy_serializes_with_tag() {
        let json = serde_json::to_value(RetrievalStrategy::mmr()).unwrap();
        assert_eq!(json["type"], "mmr");
        assert_eq!(json["fetch_k"], 20);
    }

    #[test]
    fn service_config_debug_hides_key() {
        let config = ServiceConfig::new("hf_secret", "BAAI/bge-base-en-v1.5");
        assert!(!format!("{config:?}").contains("hf_secret"));
    }
}
