//! Google Gemini providers, enabled by the `gemini` feature.
//!
//! Both talk to the Generative Language REST API and authenticate with the
//! `x-goog-api-key` header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{KeyPlacement, ServiceClient, base_url};
use crate::llm::LanguageModel;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Width of vectors from [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 3072;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

const SERVICE: &str = "Gemini";
const KEY_HEADER: &str = "x-goog-api-key";

/// What the embedding will be used for. Gemini tunes vectors per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
    SemanticSimilarity,
}

fn connect(
    config: ServiceConfig,
    fallback_model: &str,
    method: &str,
) -> Result<(ServiceClient, String)> {
    if config.api_key.is_empty() {
        return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
    }
    let model = if config.model.is_empty() { fallback_model.to_string() } else { config.model };
    let model = model.trim_start_matches("models/").to_string();
    let base = base_url(config.base_url.as_deref(), GEMINI_API_BASE);
    let url = format!("{base}/models/{model}:{method}");
    let http = ServiceClient::new(SERVICE, url, config.api_key)
        .with_key_placement(KeyPlacement::Header(KEY_HEADER));
    Ok((http, model))
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn api_error(body: &str) -> Option<String> {
    serde_json::from_str::<ApiError>(body).ok().map(|e| e.error.message)
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

impl<'a> Content<'a> {
    fn text(role: Option<&'static str>, text: &'a str) -> Self {
        Self { role, parts: [Part { text }] }
    }
}

/// Vectors from `batchEmbedContents`.
///
/// Chunks and questions go through the same trait method, so one task type covers both;
/// the default `RETRIEVAL_DOCUMENT` matches how the index is filled.
///
/// ```rust,ignore
/// use pdfqa_rag::{ServiceConfig, gemini::GeminiEmbeddingProvider};
///
/// let provider = GeminiEmbeddingProvider::new(ServiceConfig::new(key, ""))?
///     .with_output_dimensionality(768);
/// ```
pub struct GeminiEmbeddingProvider {
    http: ServiceClient,
    model: String,
    task_type: TaskType,
    output_dimensionality: Option<usize>,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// An empty model name selects [`DEFAULT_EMBEDDING_MODEL`].
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let (http, model) = connect(config, DEFAULT_EMBEDDING_MODEL, "batchEmbedContents")?;
        Ok(Self {
            http,
            model,
            task_type: TaskType::RetrievalDocument,
            output_dimensionality: None,
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Have the service truncate vectors to `dims` entries.
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self.dimensions = dims;
        self
    }

    fn failure(&self, message: String) -> RagError {
        RagError::EmbeddingError { provider: format!("{SERVICE}/{}", self.model), message }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedBody<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedReply {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Deserialize)]
struct Values {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
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
        debug!(model = %self.model, texts = texts.len(), "requesting Gemini embeddings");

        let body = BatchEmbedBody {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.model),
                    content: Content::text(None, text),
                    task_type: self.task_type,
                    output_dimensionality: self.output_dimensionality,
                })
                .collect(),
        };
        let reply: BatchEmbedReply =
            self.http.post(&body, api_error).await.map_err(|m| self.failure(m))?;
        Ok(reply.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Answers from `generateContent`, sending the prompt as one user turn.
pub struct GeminiChatModel {
    http: ServiceClient,
    model: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
}

impl GeminiChatModel {
    /// An empty model name selects [`DEFAULT_CHAT_MODEL`]. Temperature starts at 0.3.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let (http, model) = connect(config, DEFAULT_CHAT_MODEL, "generateContent")?;
        Ok(Self { http, model, temperature: 0.3, max_output_tokens: None })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    fn failure(&self, message: String) -> RagError {
        RagError::GenerationError { provider: format!("{SERVICE}/{}", self.model), message }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

impl GenerateReply {
    /// Text of the first candidate that has any, parts joined in order.
    fn into_text(self) -> Option<String> {
        self.candidates.into_iter().find_map(|candidate| {
            let parts = candidate.content?.parts;
            if parts.is_empty() {
                return None;
            }
            Some(parts.into_iter().map(|p| p.text).collect::<String>())
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "requesting Gemini completion"
        );

        let body = GenerateBody {
            contents: [Content::text(Some("user"), prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };
        let reply: GenerateReply =
            self.http.post(&body, api_error).await.map_err(|m| self.failure(m))?;

        reply.into_text().ok_or_else(|| self.failure("reply contained no candidates".into()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_a_config_error() {
        let err = GeminiEmbeddingProvider::new(ServiceConfig::new("", "")).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
        assert!(GeminiChatModel::new(ServiceConfig::new("", "")).is_err());
    }

    #[test]
    fn defaults_and_models_prefix() {
        let provider = GeminiEmbeddingProvider::new(ServiceConfig::new("k", "")).unwrap();
        assert_eq!(provider.model_id(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(provider.dimensions(), DEFAULT_EMBEDDING_DIMENSIONS);
        assert_eq!(provider.with_output_dimensionality(768).dimensions(), 768);

        let model = GeminiChatModel::new(ServiceConfig::new("k", "models/gemini-pro")).unwrap();
        assert_eq!(model.name(), "gemini-pro");
    }

    #[test]
    fn embed_request_uses_camel_case_and_task_names() {
        let request = EmbedRequest {
            model: "models/gemini-embedding-001".into(),
            content: Content::text(None, "hello"),
            task_type: TaskType::RetrievalDocument,
            output_dimensionality: Some(768),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(json["outputDimensionality"], 768);
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
        assert!(json["content"].get("role").is_none());
    }

    #[test]
    fn candidate_parts_are_joined() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Par"},{"text":"is"}]}}]}"#;
        let reply: GenerateReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.into_text().as_deref(), Some("Paris"));

        let blocked: GenerateReply = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert_eq!(blocked.into_text(), None);
    }

    #[test]
    fn error_message_is_pulled_from_the_body() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(api_error(body).as_deref(), Some("API key not valid"));
    }
}
