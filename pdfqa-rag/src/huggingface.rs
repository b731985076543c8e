//! Hugging Face Inference API providers.
//!
//! This module is only available when the `huggingface` feature is enabled.
//!
//! - [`HuggingFaceEmbeddingProvider`] calls the feature-extraction pipeline
//!   (default model `BAAI/bge-base-en-v1.5`, 768 dimensions).
//! - [`HuggingFaceTextGenerator`] calls the text generation task
//!   (default model `google/flan-t5-base`, temperature 0.3, max length 200).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{ServiceClient, base_url};
use crate::llm::LanguageModel;

pub const HF_INFERENCE_BASE: &str = "https://api-inference.huggingface.co";

pub const DEFAULT_EMBEDDING_MODEL: &str = "BAAI/bge-base-en-v1.5";

/// Dimensionality of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

pub const DEFAULT_GENERATION_MODEL: &str = "google/flan-t5-base";

const SERVICE: &str = "HuggingFace";

/// Validate the token and resolve the model name and endpoint.
fn connect(
    config: ServiceConfig,
    fallback_model: &str,
    endpoint: impl FnOnce(&str, &str) -> String,
) -> Result<(ServiceClient, String)> {
    if config.api_key.is_empty() {
        return Err(RagError::ConfigError("Hugging Face token must not be empty".into()));
    }
    let model = if config.model.is_empty() { fallback_model.to_string() } else { config.model };
    let url = endpoint(&base_url(config.base_url.as_deref(), HF_INFERENCE_BASE), &model);
    Ok((ServiceClient::new(SERVICE, url, config.api_key), model))
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

fn api_error(body: &str) -> Option<String> {
    serde_json::from_str::<ApiError>(body).ok().map(|e| e.error)
}

/// Sentence-level or token-level output of the feature-extraction pipeline.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtraction {
    Pooled(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtraction {
    /// One vector per input; token-level output is mean-pooled.
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            Self::Pooled(vectors) => vectors,
            Self::Tokens(inputs) => inputs.into_iter().map(mean_pool).collect(),
        }
    }
}

fn mean_pool(tokens: Vec<Vec<f32>>) -> Vec<f32> {
    let Some(width) = tokens.first().map(Vec::len) else { return Vec::new() };
    let mut sum = vec![0.0f32; width];
    for token in &tokens {
        for (acc, v) in sum.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let count = tokens.len() as f32;
    sum.iter_mut().for_each(|v| *v /= count);
    sum
}

/// Sentence vectors from the feature-extraction pipeline.
///
/// ```rust,ignore
/// use pdfqa_rag::{ServiceConfig, huggingface::HuggingFaceEmbeddingProvider};
///
/// let provider = HuggingFaceEmbeddingProvider::new(ServiceConfig::new(token, ""))?;
/// assert_eq!(provider.dimensions(), 768);
/// ```
pub struct HuggingFaceEmbeddingProvider {
    http: ServiceClient,
    model: String,
    dimensions: usize,
}

impl HuggingFaceEmbeddingProvider {
    /// An empty model name selects [`DEFAULT_EMBEDDING_MODEL`].
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let (http, model) = connect(config, DEFAULT_EMBEDDING_MODEL, |base, model| {
            format!("{base}/pipeline/feature-extraction/{model}")
        })?;
        Ok(Self { http, model, dimensions: DEFAULT_EMBEDDING_DIMENSIONS })
    }

    /// Declare the output dimensionality of a non-default model.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    fn failure(&self, message: String) -> RagError {
        RagError::EmbeddingError { provider: format!("{SERVICE}/{}", self.model), message }
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(self.failure("expected exactly one vector".into())),
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, texts = texts.len(), "requesting feature extraction");

        let body = json!({ "inputs": texts, "options": { "wait_for_model": true } });
        let output: FeatureExtraction =
            self.http.post(&body, api_error).await.map_err(|m| self.failure(m))?;
        Ok(output.into_embeddings())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerationParameters {
    temperature: f32,
    max_length: u32,
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Answers from the hosted text generation task (flan-t5 by default).
pub struct HuggingFaceTextGenerator {
    http: ServiceClient,
    model: String,
    parameters: GenerationParameters,
}

impl HuggingFaceTextGenerator {
    /// An empty model name selects [`DEFAULT_GENERATION_MODEL`]. Sampling starts at
    /// temperature 0.3 with a maximum length of 200.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let (http, model) = connect(config, DEFAULT_GENERATION_MODEL, |base, model| {
            format!("{base}/models/{model}")
        })?;
        Ok(Self {
            http,
            model,
            parameters: GenerationParameters { temperature: 0.3, max_length: 200 },
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.parameters.temperature = temperature;
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.parameters.max_length = max_length;
        self
    }

    fn failure(&self, message: String) -> RagError {
        RagError::GenerationError { provider: format!("{SERVICE}/{}", self.model), message }
    }
}

#[async_trait]
impl LanguageModel for HuggingFaceTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "requesting text generation"
        );

        let body = json!({
            "inputs": prompt,
            "parameters": &self.parameters,
            "options": { "wait_for_model": true },
        });
        let generated: Vec<GeneratedText> =
            self.http.post(&body, api_error).await.map_err(|m| self.failure(m))?;

        generated
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| self.failure("reply contained no generations".into()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_output_is_used_as_is() {
        let output: FeatureExtraction = serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(output.into_embeddings(), vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn token_output_is_mean_pooled() {
        let output: FeatureExtraction = serde_json::from_str("[[[1.0, 2.0], [3.0, 4.0]]]").unwrap();
        assert_eq!(output.into_embeddings(), vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn empty_token_is_rejected_at_construction() {
        assert!(HuggingFaceEmbeddingProvider::new(ServiceConfig::new("", "")).is_err());
        assert!(HuggingFaceTextGenerator::new(ServiceConfig::new("", "")).is_err());
    }

    #[test]
    fn default_models_are_selected() {
        let embedder = HuggingFaceEmbeddingProvider::new(ServiceConfig::new("hf_x", "")).unwrap();
        assert_eq!(embedder.model_id(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(embedder.dimensions(), DEFAULT_EMBEDDING_DIMENSIONS);
        let generator = HuggingFaceTextGenerator::new(ServiceConfig::new("hf_x", "")).unwrap();
        assert_eq!(generator.name(), DEFAULT_GENERATION_MODEL);
    }
}
